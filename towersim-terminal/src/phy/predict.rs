//! Position prediction adapter.
//!
//! Signal-quality records carry an optional terminal-to-tower distance
//! obtained from an external position predictor. The predictor is slow
//! relative to the observation cadence, so the adapter memoizes the last
//! successful result per (terminal, time) and a failed prediction
//! degrades the record rather than the run.

use towersim_common::{Coord, Error, SimTime, TerminalId};
use tracing::{debug, warn};

/// External source of predicted terminal positions.
pub trait PositionSource {
    /// Predicted position of `terminal` at `at`.
    fn predict(&mut self, terminal: TerminalId, at: SimTime) -> Result<Coord, Error>;
}

/// Fixed-position source for scripted runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct StubPositionSource {
    pub position: Coord,
}

impl PositionSource for StubPositionSource {
    fn predict(&mut self, _terminal: TerminalId, _at: SimTime) -> Result<Coord, Error> {
        Ok(self.position)
    }
}

/// Caching front for a [`PositionSource`].
///
/// Repeated queries for the same (terminal, time) hit the cache instead
/// of the source. Only successful predictions are cached; a failure is
/// logged and reported as `None` so callers emit the record without a
/// distance.
pub struct PredictiveDistanceAdapter {
    source: Box<dyn PositionSource + Send + Sync>,
    cache: Option<(TerminalId, SimTime, Coord)>,
}

impl std::fmt::Debug for PredictiveDistanceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictiveDistanceAdapter")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl PredictiveDistanceAdapter {
    pub fn new(source: Box<dyn PositionSource + Send + Sync>) -> Self {
        Self {
            source,
            cache: None,
        }
    }

    /// Predicted position of `terminal` at `at`, or `None` if the source
    /// failed.
    pub fn predict(&mut self, terminal: TerminalId, at: SimTime) -> Option<Coord> {
        if let Some((cached_terminal, cached_at, coord)) = self.cache {
            if cached_terminal == terminal && cached_at == at {
                debug!("Position cache hit for {terminal} at {at}");
                return Some(coord);
            }
        }
        match self.source.predict(terminal, at) {
            Ok(coord) => {
                self.cache = Some((terminal, at, coord));
                Some(coord)
            }
            Err(err) => {
                warn!("Position prediction failed for {terminal} at {at}: {err}");
                None
            }
        }
    }

    /// Predicted distance from `terminal` to a tower at `tower_position`,
    /// or `None` if prediction failed.
    pub fn predicted_distance(
        &mut self,
        terminal: TerminalId,
        at: SimTime,
        tower_position: Coord,
    ) -> Option<f64> {
        self.predict(terminal, at)
            .map(|pos| pos.distance_to(&tower_position))
    }
}
