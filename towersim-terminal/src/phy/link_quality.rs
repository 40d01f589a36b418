//! Per-direction channel-quality statistics
//!
//! The terminal periodically reports a scalar channel-quality indicator
//! (CQI) per direction. This module accumulates those samples and serves
//! running mean/variance queries to the scheduling and reporting logic
//! above the PHY layer.
//!
//! Variance uses the population formula over the recorded history (a
//! biased estimator); the purpose here is descriptive monitoring, not
//! inference. Queries on an empty accumulator return 0.0, never panic.

use towersim_common::LinkDirection;
use tracing::info;

/// Running statistics for one direction.
///
/// Keeps the full ordered sample history alongside sufficient statistics
/// (sum, sum of squares) so mean and variance are O(1) queries. The
/// count always equals the history length.
#[derive(Debug, Default, Clone)]
pub struct QualityStatAccumulator {
    samples: Vec<u16>,
    sum: u64,
    sq_sum: u64,
}

impl QualityStatAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample. O(1) amortized.
    pub fn record(&mut self, value: u16) {
        self.samples.push(value);
        self.sum += u64::from(value);
        self.sq_sum += u64::from(value) * u64::from(value);
    }

    /// Number of recorded samples.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// The ordered sample history.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Arithmetic mean of the recorded samples; 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum as f64 / self.samples.len() as f64
    }

    /// Population variance of the recorded samples; 0.0 when empty.
    pub fn variance(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let n = self.samples.len() as f64;
        let mean = self.sum as f64 / n;
        // rounding can push the difference marginally negative
        (self.sq_sum as f64 / n - mean * mean).max(0.0)
    }
}

/// Uplink/downlink CQI tracker for one terminal.
///
/// Lives as long as the terminal; accumulators are never reset except by
/// explicit session restart.
#[derive(Debug, Default)]
pub struct LinkQualityTracker {
    downlink: QualityStatAccumulator,
    uplink: QualityStatAccumulator,
}

impl LinkQualityTracker {
    /// Creates a tracker with empty accumulators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a CQI sample for the given direction.
    pub fn record_sample(&mut self, direction: LinkDirection, value: u16) {
        self.accumulator_mut(direction).record(value);
    }

    /// Mean CQI for the given direction; 0.0 before any sample.
    pub fn mean(&self, direction: LinkDirection) -> f64 {
        self.accumulator(direction).mean()
    }

    /// Population CQI variance for the given direction; 0.0 before any
    /// sample.
    pub fn variance(&self, direction: LinkDirection) -> f64 {
        self.accumulator(direction).variance()
    }

    /// The accumulator for one direction.
    pub fn accumulator(&self, direction: LinkDirection) -> &QualityStatAccumulator {
        match direction {
            LinkDirection::Downlink => &self.downlink,
            LinkDirection::Uplink => &self.uplink,
        }
    }

    fn accumulator_mut(&mut self, direction: LinkDirection) -> &mut QualityStatAccumulator {
        match direction {
            LinkDirection::Downlink => &mut self.downlink,
            LinkDirection::Uplink => &mut self.uplink,
        }
    }

    /// Clears both accumulators. Only invoked by explicit session
    /// restart policy, never implicitly.
    pub fn reset(&mut self) {
        self.downlink = QualityStatAccumulator::new();
        self.uplink = QualityStatAccumulator::new();
    }

    /// Logs the end-of-run CQI summary for both directions.
    pub fn log_summary(&self) {
        for direction in [LinkDirection::Downlink, LinkDirection::Uplink] {
            let acc = self.accumulator(direction);
            info!(
                "CQI {}: samples={}, mean={:.3}, variance={:.3}",
                direction,
                acc.count(),
                acc.mean(),
                acc.variance()
            );
        }
    }
}
