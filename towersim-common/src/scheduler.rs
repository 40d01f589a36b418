//! Simulation time and timer scheduling
//!
//! towersim is single-threaded and event-driven: component state advances
//! only when a discrete event (observation, timer firing) is delivered.
//! All delays are modeled as scheduled future events on a [`TimerQueue`],
//! never as blocking waits.
//!
//! Every armed timer carries a monotonically increasing [`TimerId`]. The
//! id doubles as a generation number: after cancellation or a state
//! change, a stale firing is recognized by id mismatch and ignored by its
//! owner, so an obsolete phase timer can never act on newer state.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Simulation timestamp with millisecond resolution. Defaults to the
/// epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// The simulation epoch.
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a timestamp from milliseconds since the simulation epoch.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the timestamp as milliseconds since the simulation epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns this timestamp advanced by the given duration.
    pub fn after(&self, delay: Duration) -> Self {
        Self(self.0 + delay.as_millis() as u64)
    }

    /// Elapsed time since an earlier timestamp. Saturates at zero if
    /// `earlier` is in the future.
    pub fn since(&self, earlier: SimTime) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}ms", self.0)
    }
}

impl From<u64> for SimTime {
    fn from(ms: u64) -> Self {
        Self(ms)
    }
}

/// Handle for an armed timer.
///
/// Ids are allocated from a single monotonically increasing counter, so a
/// handle stored by a component uniquely identifies one arming; comparing
/// a delivered firing against the stored handle detects staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// A timer that came due during [`TimerQueue::advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFiring {
    /// Handle returned when the timer was armed.
    pub id: TimerId,
    /// The deadline the timer was armed for.
    pub deadline: SimTime,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: SimTime,
    id: u64,
}

/// Deterministic timer queue over simulation time.
///
/// Due timers fire in (deadline, arming order) order; cancelled timers
/// never fire. Cancellation is lazy: entries stay in the heap until their
/// deadline passes and are dropped silently then.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: SimTime,
    next_id: u64,
    heap: BinaryHeap<Reverse<Entry>>,
    pending_ids: HashSet<u64>,
}

impl TimerQueue {
    /// Creates an empty queue at the simulation epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of armed, not-yet-fired, not-cancelled timers.
    pub fn pending(&self) -> usize {
        self.pending_ids.len()
    }

    /// Arms a timer to fire `delay` after the current time.
    pub fn schedule_after(&mut self, delay: Duration) -> TimerId {
        self.schedule_at(self.now.after(delay))
    }

    /// Arms a timer for an absolute deadline. A deadline at or before the
    /// current time fires on the next [`advance_to`](Self::advance_to).
    pub fn schedule_at(&mut self, deadline: SimTime) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse(Entry { deadline, id }));
        self.pending_ids.insert(id);
        TimerId(id)
    }

    /// Cancels an armed timer. Returns `true` if the timer was still
    /// pending, `false` if it already fired or was already cancelled.
    /// Cancellation is lazy; the heap entry is dropped when its deadline
    /// passes.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending_ids.remove(&id.0)
    }

    /// Cancels every outstanding timer. Mandatory cleanup on terminal
    /// teardown so no callback acts on destroyed state.
    pub fn cancel_all(&mut self) {
        self.pending_ids.clear();
    }

    /// Advances simulation time to `t` and returns every timer that came
    /// due, in deterministic (deadline, arming order) order. Time never
    /// moves backwards; an earlier `t` only drains already-due timers.
    pub fn advance_to(&mut self, t: SimTime) -> Vec<TimerFiring> {
        if t > self.now {
            self.now = t;
        }
        let mut fired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > self.now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                if !self.pending_ids.remove(&entry.id) {
                    continue; // cancelled
                }
                fired.push(TimerFiring {
                    id: TimerId(entry.id),
                    deadline: entry.deadline,
                });
            }
        }
        fired
    }
}

/// Wall-clock-free simulation clock with a fixed tick duration.
///
/// The node task advances this once per scheduling pass and feeds the
/// resulting time into its [`TimerQueue`].
#[derive(Debug)]
pub struct SimClock {
    now: SimTime,
    tick: Duration,
}

impl SimClock {
    /// Creates a clock at the epoch with the given tick duration.
    pub fn new(tick: Duration) -> Self {
        Self {
            now: SimTime::ZERO,
            tick,
        }
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Tick duration.
    pub fn tick_duration(&self) -> Duration {
        self.tick
    }

    /// Advances the clock by one tick and returns the new time.
    pub fn advance_tick(&mut self) -> SimTime {
        self.now = self.now.after(self.tick);
        self.now
    }
}
