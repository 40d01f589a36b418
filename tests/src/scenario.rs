//! Synchronous scenario bench over the handover core.
//!
//! Drives the state machine, timer queue, buffers and quality statistics
//! through whole broadcast cycles without the async task wrapper, so
//! scenarios control simulation time exactly.

use std::time::Duration;

use bytes::Bytes;
use towersim_common::{HandoverConfig, SimTime, TerminalId, TimerQueue, TowerId};
use towersim_terminal::phy::{ConnectionBufferStore, HandoverEvent, ReconcileBuffers};
use towersim_terminal::HandoverStateMachine;

/// One terminal's handover core with explicit time control.
pub struct ScenarioBench {
    pub terminal: TerminalId,
    pub machine: HandoverStateMachine,
    pub timers: TimerQueue,
    pub buffers: ConnectionBufferStore,
    pub events: Vec<HandoverEvent>,
    broadcast_interval: Duration,
}

impl ScenarioBench {
    pub fn new(config: HandoverConfig, initial_tower: TowerId) -> Self {
        Self {
            terminal: TerminalId(1),
            machine: HandoverStateMachine::new(config, initial_tower),
            timers: TimerQueue::new(),
            buffers: ConnectionBufferStore::new(),
            events: Vec::new(),
            broadcast_interval: Duration::from_millis(100),
        }
    }

    /// Delivers one broadcast cycle: serving strength, neighbor
    /// strengths, then the end-of-cycle evaluation trigger.
    pub fn broadcast_cycle(&mut self, serving_rssi: f64, neighbors: &[(TowerId, f64)]) {
        if let Some(event) = self
            .machine
            .on_serving_observation(serving_rssi, &mut self.timers)
        {
            self.record(event);
        }
        for &(tower, rssi) in neighbors {
            self.machine.on_neighbor_observation(tower, rssi);
        }
        if let Some(event) = self.machine.on_evaluation_trigger(&mut self.timers) {
            self.record(event);
        }
    }

    /// Advances simulation time to `t`, draining timers through the
    /// machine 1ms at a time the way the task's tick loop does.
    pub fn run_until(&mut self, t: SimTime) {
        let mut now = self.timers.now();
        while now < t {
            now = SimTime::from_millis(now.as_millis() + 1);
            let firings = self.timers.advance_to(now);
            for firing in firings {
                if let Some(event) = self.machine.on_timer(firing, &mut self.timers) {
                    self.record(event);
                }
            }
        }
    }

    /// Advances by one broadcast interval.
    pub fn run_one_cycle(&mut self) {
        let next = self.timers.now().after(self.broadcast_interval);
        self.run_until(next);
    }

    pub fn buffer_frame(&mut self, tower: TowerId, payload: &'static [u8]) {
        self.buffers
            .push(self.terminal, tower, Bytes::from_static(payload));
    }

    /// Events observed so far, draining the log.
    pub fn take_events(&mut self) -> Vec<HandoverEvent> {
        std::mem::take(&mut self.events)
    }

    /// The completion latency of the first completed handover in the
    /// event log, if any.
    pub fn completion_latency(&self) -> Option<Duration> {
        self.events.iter().find_map(|event| match event {
            HandoverEvent::Completed { latency, .. } => Some(*latency),
            _ => None,
        })
    }

    fn record(&mut self, event: HandoverEvent) {
        if let HandoverEvent::Completed { old_tower, .. } = event {
            self.buffers.reconcile(self.terminal, old_tower);
        }
        self.events.push(event);
    }
}
