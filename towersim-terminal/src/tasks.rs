//! Task infrastructure and message definitions.
//!
//! Terminal tasks are async actors that process messages from their
//! receive channel. Each task implementation defines its own message
//! type and processing logic; the [`TaskMessage`] envelope adds a
//! uniform shutdown signal on top.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use towersim_common::{Coord, LinkDirection, TowerId};

use crate::phy::{FeedbackRequest, FeedbackVector, PhyStatus};

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Creates a new message envelope containing the given payload.
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    /// Creates a shutdown signal.
    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }

    /// Returns true if this is a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Base trait for terminal tasks.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop, processing messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Messages for the PHY task.
#[derive(Debug)]
pub enum PhyMessage {
    /// Signal-strength broadcast from a tower, with its advertised load
    /// and optionally its position for distance prediction.
    Observation {
        tower: TowerId,
        rssi: f64,
        load: u32,
        tower_position: Option<Coord>,
    },
    /// Single channel-quality report for one link direction.
    CqiReport { direction: LinkDirection, value: u16 },
    /// Per-band feedback vectors for both directions.
    Feedback {
        downlink: FeedbackVector,
        uplink: FeedbackVector,
        request: FeedbackRequest,
    },
    /// Downlink data addressed to this terminal via a tower.
    BufferData { tower: TowerId, payload: Bytes },
    /// Status query, answered on the provided channel.
    GetStatus { reply: oneshot::Sender<PhyStatus> },
}

/// Notifications the PHY task emits towards its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum PhyIndication {
    HandoverStarted {
        from: TowerId,
        to: TowerId,
    },
    HandoverAborted {
        candidate: TowerId,
    },
    HandoverCompleted {
        old_tower: TowerId,
        new_tower: TowerId,
        latency: std::time::Duration,
    },
    Detached {
        tower: TowerId,
        rssi: f64,
    },
}
