//! Terminal PHY layer
//!
//! The PHY layer owns the terminal's association with its serving tower:
//! it consumes signal-strength observations and CQI reports delivered by
//! the environment, decides handovers with a hysteresis rule, runs the
//! phased transition, and reconciles per-connection buffers once a switch
//! completes.

pub mod buffers;
pub mod feedback;
pub mod handover;
pub mod hysteresis;
pub mod link_quality;
pub mod load;
pub mod predict;
pub mod recorder;
pub mod task;

pub use buffers::{ConnectionBufferStore, ReconcileBuffers};
pub use feedback::{FeedbackKind, FeedbackRequest, FeedbackSink, FeedbackVector};
pub use handover::{HandoverEvent, HandoverPhase, HandoverStateMachine, TerminalLinkState};
pub use hysteresis::HysteresisEvaluator;
pub use link_quality::{LinkQualityTracker, QualityStatAccumulator};
pub use load::TowerLoadTable;
pub use predict::{PositionSource, PredictiveDistanceAdapter, StubPositionSource};
pub use recorder::{DelimitedRecorder, MeasurementSink, ObservationRecord, PositionRecord};
pub use task::{PhyStatus, PhyTask};
