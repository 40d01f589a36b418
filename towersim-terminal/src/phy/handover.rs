//! Handover state machine
//!
//! Owns the terminal's serving-tower association and drives the phased
//! handover procedure:
//!
//! ```text
//! None -> Evaluating -> Detaching -> Attaching -> None
//! ```
//!
//! Broadcast observations only update candidate bookkeeping; a separate
//! evaluation trigger, fired at the broadcast cadence, applies the
//! hysteresis rule. A switch-worthy candidate opens a short
//! `handover_delta` window so all broadcasts of the cycle are
//! consolidated, then the decision is re-validated against the latest
//! strengths before committing (flap suppression). Detachment and
//! attachment each hold for their configured duration; completion
//! reassigns the serving tower and reports the total latency
//! `delta + detachment + attachment`.
//!
//! The `min_rssi` floor takes precedence over everything: a serving
//! strength below it detaches the terminal immediately, even
//! mid-transition, cancelling any armed phase timer.
//!
//! All delays are timers on the caller's [`TimerQueue`]; each armed timer
//! handle is compared against the stored one when it fires, so stale
//! firings from a cancelled or superseded phase are ignored.

use std::time::Duration;

use towersim_common::{HandoverConfig, SimTime, TimerFiring, TimerId, TimerQueue, TowerId};
use tracing::{debug, info, warn};

use crate::phy::hysteresis::HysteresisEvaluator;

/// Pending-transition phase of the handover procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoverPhase {
    /// Stably attached, no pending change.
    #[default]
    None,
    /// Switch-worthy candidate found; consolidation window open.
    Evaluating,
    /// Leaving the old serving tower.
    Detaching,
    /// Joining the candidate tower.
    Attaching,
}

impl std::fmt::Display for HandoverPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandoverPhase::None => write!(f, "None"),
            HandoverPhase::Evaluating => write!(f, "Evaluating"),
            HandoverPhase::Detaching => write!(f, "Detaching"),
            HandoverPhase::Attaching => write!(f, "Attaching"),
        }
    }
}

/// Candidate tower bookkeeping: the best non-serving tower observed
/// since the last evaluation window opened.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    tower: TowerId,
    rssi: f64,
}

/// Per-terminal link state owned by the state machine.
#[derive(Debug)]
pub struct TerminalLinkState {
    serving_tower: TowerId,
    serving_rssi: f64,
    hysteresis_threshold: f64,
    candidate: Option<Candidate>,
    phase: HandoverPhase,
    phase_timer: Option<TimerId>,
    evaluation_opened_at: Option<SimTime>,
    detached: bool,
}

/// Event produced by advancing the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoverEvent {
    /// A switch-worthy candidate opened the consolidation window.
    EvaluationStarted { from: TowerId, to: TowerId },
    /// Re-validation failed; the transition was abandoned and the
    /// serving tower is unchanged.
    EvaluationAborted { candidate: TowerId },
    /// Detachment from the old serving tower began.
    DetachmentStarted { from: TowerId, to: TowerId },
    /// Attachment to the candidate tower began.
    AttachmentStarted { to: TowerId },
    /// The handover committed: the terminal is now served by
    /// `new_tower`. Buffers addressed to `old_tower` must be reconciled.
    Completed {
        old_tower: TowerId,
        new_tower: TowerId,
        latency: Duration,
    },
    /// Serving strength fell below the `min_rssi` floor; the terminal is
    /// detached regardless of handover progress.
    Detached { tower: TowerId, rssi: f64 },
}

/// Hysteresis-driven, timer-phased handover state machine.
///
/// Single-threaded by construction: state advances only through the
/// methods below, called serially by the surrounding event loop.
#[derive(Debug)]
pub struct HandoverStateMachine {
    config: HandoverConfig,
    evaluator: HysteresisEvaluator,
    state: TerminalLinkState,
}

impl HandoverStateMachine {
    /// Creates a state machine attached to `initial_tower`. The config
    /// is assumed validated (see `HandoverConfig::validate`).
    pub fn new(config: HandoverConfig, initial_tower: TowerId) -> Self {
        let evaluator = HysteresisEvaluator::new(config.hysteresis_factor);
        Self {
            config,
            evaluator,
            state: TerminalLinkState {
                serving_tower: initial_tower,
                serving_rssi: 0.0,
                hysteresis_threshold: 0.0,
                candidate: None,
                phase: HandoverPhase::None,
                phase_timer: None,
                evaluation_opened_at: None,
                detached: false,
            },
        }
    }

    /// Current serving tower. Defined even while detached or
    /// mid-transition; reassigned only at completion.
    pub fn serving_tower(&self) -> TowerId {
        self.state.serving_tower
    }

    /// Last-known serving strength.
    pub fn serving_rssi(&self) -> f64 {
        self.state.serving_rssi
    }

    /// Current hysteresis threshold, derived from the serving strength.
    pub fn hysteresis_threshold(&self) -> f64 {
        self.state.hysteresis_threshold
    }

    /// Current pending-transition phase.
    pub fn phase(&self) -> HandoverPhase {
        self.state.phase
    }

    /// Whether the terminal is below the signal floor.
    pub fn is_detached(&self) -> bool {
        self.state.detached
    }

    /// The current candidate tower and strength, if any.
    pub fn candidate(&self) -> Option<(TowerId, f64)> {
        self.state.candidate.map(|c| (c.tower, c.rssi))
    }

    /// Handles a signal-strength observation from the serving tower.
    ///
    /// Updates the stored strength, recomputes the hysteresis threshold,
    /// and enforces the `min_rssi` floor, which takes precedence over
    /// any transition in progress.
    pub fn on_serving_observation(
        &mut self,
        rssi: f64,
        timers: &mut TimerQueue,
    ) -> Option<HandoverEvent> {
        if !rssi.is_finite() || rssi < 0.0 {
            warn!("Rejecting invalid serving observation: rssi={rssi}");
            return None;
        }
        self.state.serving_rssi = rssi;
        self.state.hysteresis_threshold = self.evaluator.threshold(rssi);

        if rssi < self.config.min_rssi {
            return Some(self.force_detach(timers));
        }
        if self.state.detached {
            debug!(
                "Serving signal back above floor: {} rssi={:.3}",
                self.state.serving_tower, rssi
            );
            self.state.detached = false;
        }
        None
    }

    /// Handles a broadcast observation from a non-serving tower.
    ///
    /// Only candidate bookkeeping: the strongest non-serving tower of
    /// the window is kept; ties keep the earlier-observed tower. Never
    /// triggers evaluation by itself.
    pub fn on_neighbor_observation(&mut self, tower: TowerId, rssi: f64) {
        if !rssi.is_finite() || rssi < 0.0 {
            warn!("Rejecting invalid broadcast observation: {tower} rssi={rssi}");
            return;
        }
        if tower == self.state.serving_tower {
            // serving observations take the other path; keeps the
            // candidate != serving invariant
            warn!("Broadcast from serving tower {tower} routed as neighbor; ignoring");
            return;
        }
        match self.state.candidate {
            Some(current) if rssi <= current.rssi => {}
            _ => {
                debug!("New candidate: {tower} rssi={rssi:.3}");
                self.state.candidate = Some(Candidate { tower, rssi });
            }
        }
    }

    /// Timed evaluation trigger, fired at the broadcast cadence.
    ///
    /// Applies the hysteresis rule to the current candidate. If
    /// switch-worthy (and handover is enabled, the terminal attached,
    /// and no transition pending), opens the `handover_delta`
    /// consolidation window. Otherwise resets candidate bookkeeping for
    /// the next window.
    pub fn on_evaluation_trigger(&mut self, timers: &mut TimerQueue) -> Option<HandoverEvent> {
        if self.state.phase != HandoverPhase::None {
            return None;
        }
        let candidate = self.state.candidate?;
        if !self.config.enable_handover || self.state.detached {
            self.state.candidate = None;
            return None;
        }
        if !HysteresisEvaluator::should_switch(
            self.state.serving_rssi,
            candidate.rssi,
            self.state.hysteresis_threshold,
        ) {
            debug!(
                "Candidate {} not switch-worthy ({:.3} <= {:.3} + {:.3})",
                candidate.tower,
                candidate.rssi,
                self.state.serving_rssi,
                self.state.hysteresis_threshold
            );
            self.state.candidate = None;
            return None;
        }

        self.state.phase = HandoverPhase::Evaluating;
        self.state.evaluation_opened_at = Some(timers.now());
        self.state.phase_timer = Some(timers.schedule_after(self.config.handover_delta()));
        info!(
            "Handover evaluation: {} -> {} (candidate {:.3} > serving {:.3} + th {:.3})",
            self.state.serving_tower,
            candidate.tower,
            candidate.rssi,
            self.state.serving_rssi,
            self.state.hysteresis_threshold
        );
        Some(HandoverEvent::EvaluationStarted {
            from: self.state.serving_tower,
            to: candidate.tower,
        })
    }

    /// Handles a timer firing delivered by the event loop.
    ///
    /// Firings whose id does not match the armed phase timer are stale
    /// (cancelled or superseded) and ignored. Next-phase timers are
    /// armed from the firing's deadline, not the delivery time, so the
    /// committed-handover latency is exact regardless of scheduling
    /// granularity.
    pub fn on_timer(
        &mut self,
        firing: TimerFiring,
        timers: &mut TimerQueue,
    ) -> Option<HandoverEvent> {
        if self.state.phase_timer != Some(firing.id) {
            debug!("Ignoring stale {} (phase {})", firing.id, self.state.phase);
            return None;
        }
        match self.state.phase {
            HandoverPhase::None => {
                warn!("Phase timer fired with no pending transition");
                self.state.phase_timer = None;
                None
            }
            HandoverPhase::Evaluating => self.finish_evaluation(firing, timers),
            HandoverPhase::Detaching => {
                self.state.phase = HandoverPhase::Attaching;
                self.state.phase_timer = Some(
                    timers.schedule_at(firing.deadline.after(self.config.handover_attachment())),
                );
                let to = self.state.candidate.map(|c| c.tower);
                debug!("Detachment complete, attaching to {to:?}");
                to.map(|to| HandoverEvent::AttachmentStarted { to })
            }
            HandoverPhase::Attaching => Some(self.complete(firing)),
        }
    }

    /// Tears the terminal down: cancels any outstanding transition and
    /// its timers. Mandatory before destroying the terminal's state.
    pub fn teardown(&mut self, timers: &mut TimerQueue) {
        if let Some(timer) = self.state.phase_timer.take() {
            timers.cancel(timer);
        }
        self.state.phase = HandoverPhase::None;
        self.state.candidate = None;
        self.state.evaluation_opened_at = None;
    }

    /// Re-validation at the end of the consolidation window: the
    /// candidate must still be switch-worthy against the latest observed
    /// strengths, otherwise the transition aborts (flap suppression).
    fn finish_evaluation(
        &mut self,
        firing: TimerFiring,
        timers: &mut TimerQueue,
    ) -> Option<HandoverEvent> {
        let candidate = match self.state.candidate {
            Some(c) => c,
            None => {
                self.abort_evaluation();
                return None;
            }
        };
        let still_worthy = HysteresisEvaluator::should_switch(
            self.state.serving_rssi,
            candidate.rssi,
            self.state.hysteresis_threshold,
        );
        if !still_worthy {
            info!(
                "Handover aborted: {} no longer switch-worthy against {}",
                candidate.tower, self.state.serving_tower
            );
            self.abort_evaluation();
            return Some(HandoverEvent::EvaluationAborted {
                candidate: candidate.tower,
            });
        }
        self.state.phase = HandoverPhase::Detaching;
        self.state.phase_timer =
            Some(timers.schedule_at(firing.deadline.after(self.config.handover_detachment())));
        info!(
            "Handover committed: detaching from {} towards {}",
            self.state.serving_tower, candidate.tower
        );
        Some(HandoverEvent::DetachmentStarted {
            from: self.state.serving_tower,
            to: candidate.tower,
        })
    }

    fn abort_evaluation(&mut self) {
        self.state.phase = HandoverPhase::None;
        self.state.phase_timer = None;
        self.state.candidate = None;
        self.state.evaluation_opened_at = None;
    }

    fn complete(&mut self, firing: TimerFiring) -> HandoverEvent {
        let old_tower = self.state.serving_tower;
        // candidate is retained through Detaching/Attaching; a missing
        // one here is a consistency violation we recover from by staying
        // put
        let (new_tower, rssi) = match self.state.candidate.take() {
            Some(c) => (c.tower, c.rssi),
            None => {
                warn!("Attachment completed without candidate; staying on {old_tower}");
                (old_tower, self.state.serving_rssi)
            }
        };
        let latency = self
            .state
            .evaluation_opened_at
            .take()
            .map(|opened| firing.deadline.since(opened))
            .unwrap_or_default();

        self.state.serving_tower = new_tower;
        self.state.serving_rssi = rssi;
        self.state.hysteresis_threshold = self.evaluator.threshold(rssi);
        self.state.phase = HandoverPhase::None;
        self.state.phase_timer = None;

        info!(
            "Handover complete: {} -> {} (latency {:?})",
            old_tower, new_tower, latency
        );
        HandoverEvent::Completed {
            old_tower,
            new_tower,
            latency,
        }
    }

    /// Floor violation: not an error, a defined transition. Cancels any
    /// in-flight phase and marks the terminal detached.
    fn force_detach(&mut self, timers: &mut TimerQueue) -> HandoverEvent {
        if let Some(timer) = self.state.phase_timer.take() {
            timers.cancel(timer);
        }
        if self.state.phase != HandoverPhase::None {
            info!(
                "Signal floor reached during {} phase; transition cancelled",
                self.state.phase
            );
        }
        self.state.phase = HandoverPhase::None;
        self.state.candidate = None;
        self.state.evaluation_opened_at = None;
        self.state.detached = true;
        warn!(
            "Terminal detached: {} rssi={:.3} below floor {:.3}",
            self.state.serving_tower, self.state.serving_rssi, self.config.min_rssi
        );
        HandoverEvent::Detached {
            tower: self.state.serving_tower,
            rssi: self.state.serving_rssi,
        }
    }
}
