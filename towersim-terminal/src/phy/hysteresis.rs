//! Hysteresis handover decision rule
//!
//! A candidate tower is switch-worthy only when its strength exceeds the
//! serving tower's by more than the hysteresis threshold. The threshold
//! is derived from the current serving strength divided by a configured
//! factor, so the required margin scales with how strong the current
//! link already is. A factor of zero disables the margin: any strictly
//! stronger tower wins.

/// Evaluates the hysteresis rule for a terminal.
///
/// Pure; strengths are non-negative by the intake invariant, and the
/// factor is validated at configuration time.
#[derive(Debug, Clone, Copy)]
pub struct HysteresisEvaluator {
    factor: f64,
}

impl HysteresisEvaluator {
    /// Creates an evaluator with the given hysteresis factor (>= 0,
    /// enforced by configuration validation).
    pub fn new(factor: f64) -> Self {
        debug_assert!(factor.is_finite() && factor >= 0.0);
        Self { factor }
    }

    /// Derives the hysteresis threshold from the current serving
    /// strength. Zero factor yields a zero threshold.
    pub fn threshold(&self, serving_rssi: f64) -> f64 {
        if self.factor == 0.0 {
            0.0
        } else {
            serving_rssi / self.factor
        }
    }

    /// Returns true iff the candidate is switch-worthy:
    /// `candidate > current + threshold`, strictly. Boundary equality is
    /// not switch-worthy.
    pub fn should_switch(current_rssi: f64, candidate_rssi: f64, threshold: f64) -> bool {
        debug_assert!(current_rssi >= 0.0 && candidate_rssi >= 0.0 && threshold >= 0.0);
        candidate_rssi > current_rssi + threshold
    }
}
