//! Common types and utilities for towersim
//!
//! This crate provides shared types, configuration structures, the
//! simulation clock/timer scheduler, and logging setup used across all
//! towersim crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod types;

pub use config::{HandoverConfig, TerminalConfig};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, LogLevel};
pub use scheduler::{SimClock, SimTime, TimerFiring, TimerId, TimerQueue};
pub use types::{Coord, LinkDirection, TerminalId, TowerId};
