//! towersim mobile terminal implementation
//!
//! This crate implements the terminal-side link-quality tracking and
//! handover decision core of the towersim cellular network simulator:
//!
//! - PHY-layer handover state machine with hysteresis decision rule and
//!   phased timed transitions ([`phy::handover`])
//! - per-direction CQI statistics ([`phy::link_quality`])
//! - connection-buffer reconciliation on serving-tower change
//!   ([`phy::buffers`])
//! - predictive-distance adapter for analysis ([`phy::predict`])
//! - actor-style task wrapper driving the core from an event loop
//!   ([`phy::task`])

pub mod phy;
pub mod tasks;

pub use phy::handover::{HandoverEvent, HandoverPhase, HandoverStateMachine};
pub use phy::link_quality::LinkQualityTracker;
pub use phy::task::{PhyStatus, PhyTask};
pub use tasks::{PhyIndication, PhyMessage, Task, TaskMessage};
