//! Channel-quality feedback intake.
//!
//! The environment delivers per-band quality vectors for both link
//! directions, either on the periodic cadence or aperiodically on
//! request. The sink flattens each vector into the per-direction quality
//! statistics and keeps the last delivery for status queries.

use towersim_common::LinkDirection;
use tracing::debug;

use crate::phy::link_quality::LinkQualityTracker;

/// Whether a feedback delivery was scheduled or requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Periodic,
    Aperiodic,
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackKind::Periodic => write!(f, "periodic"),
            FeedbackKind::Aperiodic => write!(f, "aperiodic"),
        }
    }
}

/// A request for out-of-cycle feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackRequest {
    pub kind: FeedbackKind,
}

/// Per-band quality values, one inner vector per codeword.
pub type FeedbackVector = Vec<Vec<u16>>;

/// Accepts feedback deliveries and feeds them into the quality tracker.
#[derive(Debug, Default)]
pub struct FeedbackSink {
    deliveries: usize,
    last_kind: Option<FeedbackKind>,
}

impl FeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one delivery for both directions.
    pub fn ingest(
        &mut self,
        downlink: FeedbackVector,
        uplink: FeedbackVector,
        request: FeedbackRequest,
        tracker: &mut LinkQualityTracker,
    ) {
        debug!(
            "Feedback ({}): {} DL codewords, {} UL codewords",
            request.kind,
            downlink.len(),
            uplink.len()
        );
        for value in downlink.iter().flatten() {
            tracker.record_sample(LinkDirection::Downlink, *value);
        }
        for value in uplink.iter().flatten() {
            tracker.record_sample(LinkDirection::Uplink, *value);
        }
        self.deliveries += 1;
        self.last_kind = Some(request.kind);
    }

    /// Number of deliveries ingested so far.
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    /// Kind of the most recent delivery, if any.
    pub fn last_kind(&self) -> Option<FeedbackKind> {
        self.last_kind
    }
}
