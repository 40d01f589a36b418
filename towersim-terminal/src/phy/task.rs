//! PHY task for the terminal.
//!
//! Async actor that owns the handover state machine, the quality
//! statistics, the per-connection buffers, and the simulation clock. The
//! run loop multiplexes environment messages with two internal cadences:
//! a fine tick that advances simulation time and drains due timers, and
//! the broadcast-cycle evaluation trigger.

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use towersim_common::{Coord, LinkDirection, SimClock, TerminalConfig, TerminalId, TimerQueue, TowerId};

use crate::phy::{
    ConnectionBufferStore, FeedbackRequest, FeedbackSink, FeedbackVector, HandoverEvent,
    HandoverPhase, HandoverStateMachine, LinkQualityTracker, MeasurementSink, ObservationRecord,
    PositionRecord, PredictiveDistanceAdapter, ReconcileBuffers, TowerLoadTable,
};
use crate::tasks::{PhyIndication, PhyMessage, Task, TaskMessage};

/// Snapshot of the PHY state, answered on `PhyMessage::GetStatus`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhyStatus {
    pub serving_tower: TowerId,
    pub serving_rssi: f64,
    pub phase: HandoverPhase,
    pub detached: bool,
    pub mean_downlink_cqi: f64,
    pub mean_uplink_cqi: f64,
    pub buffered_frames: usize,
    pub feedback_deliveries: usize,
}

/// PHY task owning the terminal's link state.
pub struct PhyTask {
    terminal_id: TerminalId,
    config: TerminalConfig,
    machine: HandoverStateMachine,
    tracker: LinkQualityTracker,
    feedback: FeedbackSink,
    buffers: ConnectionBufferStore,
    loads: TowerLoadTable,
    clock: SimClock,
    timers: TimerQueue,
    recorder: Option<Box<dyn MeasurementSink + Send + Sync>>,
    predictor: Option<PredictiveDistanceAdapter>,
    indication_tx: mpsc::Sender<PhyIndication>,
}

impl PhyTask {
    pub fn new(config: TerminalConfig, indication_tx: mpsc::Sender<PhyIndication>) -> Self {
        let terminal_id = config.terminal_id;
        let machine = HandoverStateMachine::new(config.handover.clone(), config.initial_tower);
        let loads = TowerLoadTable::new(config.num_towers as usize);
        let clock = SimClock::new(config.tick());
        Self {
            terminal_id,
            config,
            machine,
            tracker: LinkQualityTracker::new(),
            feedback: FeedbackSink::new(),
            buffers: ConnectionBufferStore::new(),
            loads,
            clock,
            timers: TimerQueue::new(),
            recorder: None,
            predictor: None,
            indication_tx,
        }
    }

    /// Attaches a measurement sink; every observation is exported.
    pub fn with_recorder(mut self, recorder: Box<dyn MeasurementSink + Send + Sync>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Attaches a position predictor for observation distances.
    pub fn with_predictor(mut self, predictor: PredictiveDistanceAdapter) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn serving_tower(&self) -> TowerId {
        self.machine.serving_tower()
    }

    /// Mean CQI observed so far for a direction.
    pub fn mean_cqi(&self, direction: LinkDirection) -> f64 {
        self.tracker.mean(direction)
    }

    /// Population CQI variance observed so far for a direction.
    pub fn variance_cqi(&self, direction: LinkDirection) -> f64 {
        self.tracker.variance(direction)
    }

    fn status(&self) -> PhyStatus {
        PhyStatus {
            serving_tower: self.machine.serving_tower(),
            serving_rssi: self.machine.serving_rssi(),
            phase: self.machine.phase(),
            detached: self.machine.is_detached(),
            mean_downlink_cqi: self.tracker.mean(LinkDirection::Downlink),
            mean_uplink_cqi: self.tracker.mean(LinkDirection::Uplink),
            buffered_frames: self.buffers.total_frames(),
            feedback_deliveries: self.feedback.deliveries(),
        }
    }

    async fn emit(&self, indication: PhyIndication) {
        if self.indication_tx.send(indication).await.is_err() {
            debug!("Indication receiver dropped");
        }
    }

    async fn dispatch_event(&mut self, event: HandoverEvent) {
        match event {
            HandoverEvent::EvaluationStarted { from, to } => {
                self.emit(PhyIndication::HandoverStarted { from, to }).await;
            }
            HandoverEvent::EvaluationAborted { candidate } => {
                self.emit(PhyIndication::HandoverAborted { candidate }).await;
            }
            HandoverEvent::DetachmentStarted { from, to } => {
                debug!("Detaching from {from} towards {to}");
            }
            HandoverEvent::AttachmentStarted { to } => {
                debug!("Attaching to {to}");
            }
            HandoverEvent::Completed {
                old_tower,
                new_tower,
                latency,
            } => {
                self.buffers.reconcile(self.terminal_id, old_tower);
                self.emit(PhyIndication::HandoverCompleted {
                    old_tower,
                    new_tower,
                    latency,
                })
                .await;
            }
            HandoverEvent::Detached { tower, rssi } => {
                self.emit(PhyIndication::Detached { tower, rssi }).await;
            }
        }
    }

    async fn handle_observation(
        &mut self,
        tower: TowerId,
        rssi: f64,
        load: u32,
        tower_position: Option<Coord>,
    ) {
        if let Err(e) = self.loads.record(tower, load) {
            warn!("Dropping load report: {e}");
        }
        let event = if tower == self.machine.serving_tower() {
            self.machine.on_serving_observation(rssi, &mut self.timers)
        } else {
            self.machine.on_neighbor_observation(tower, rssi);
            None
        };
        if let Some(event) = event {
            self.dispatch_event(event).await;
        }
        self.export_observation(tower, rssi, tower_position);
    }

    fn export_observation(&mut self, tower: TowerId, rssi: f64, tower_position: Option<Coord>) {
        if self.recorder.is_none() {
            return;
        }
        let now = self.clock.now();
        let predicted = match (self.predictor.as_mut(), tower_position) {
            (Some(predictor), Some(_)) => predictor.predict(self.terminal_id, now),
            _ => None,
        };
        let distance = match (predicted, tower_position) {
            (Some(position), Some(tower_position)) => {
                Some(position.distance_to(&tower_position))
            }
            _ => None,
        };
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let record = ObservationRecord {
            time: now,
            terminal: self.terminal_id,
            tower,
            rssi,
            distance,
            tower_load: self.loads.load(tower),
        };
        if let Err(e) = recorder.record_observation(&record) {
            warn!("Measurement export failed: {e}");
        }
        if let Some(position) = predicted {
            let record = PositionRecord {
                time: now,
                terminal: self.terminal_id,
                tower,
                rssi,
                x: position.x,
                y: position.y,
            };
            if let Err(e) = recorder.record_position(&record) {
                warn!("Position export failed: {e}");
            }
        }
    }

    async fn handle_feedback(
        &mut self,
        downlink: FeedbackVector,
        uplink: FeedbackVector,
        request: FeedbackRequest,
    ) {
        self.feedback
            .ingest(downlink, uplink, request, &mut self.tracker);
    }

    async fn handle_message(&mut self, msg: PhyMessage) {
        match msg {
            PhyMessage::Observation {
                tower,
                rssi,
                load,
                tower_position,
            } => self.handle_observation(tower, rssi, load, tower_position).await,
            PhyMessage::CqiReport { direction, value } => {
                self.tracker.record_sample(direction, value);
            }
            PhyMessage::Feedback {
                downlink,
                uplink,
                request,
            } => self.handle_feedback(downlink, uplink, request).await,
            PhyMessage::BufferData { tower, payload } => {
                self.buffers.push(self.terminal_id, tower, payload);
            }
            PhyMessage::GetStatus { reply } => {
                if reply.send(self.status()).is_err() {
                    debug!("Status requester dropped");
                }
            }
        }
    }

    /// Advances simulation time by one tick and drains due timers into
    /// the state machine. Re-drains until quiet: a coarse tick can pass
    /// several phase deadlines at once, and handling one firing chains
    /// the next phase timer at a deadline that may already be due.
    async fn on_tick(&mut self) {
        let now = self.clock.advance_tick();
        loop {
            let firings = self.timers.advance_to(now);
            if firings.is_empty() {
                break;
            }
            for firing in firings {
                if let Some(event) = self.machine.on_timer(firing, &mut self.timers) {
                    self.dispatch_event(event).await;
                }
            }
        }
    }

    /// Broadcast-cycle boundary: evaluate the consolidated candidate.
    async fn on_evaluation(&mut self) {
        if let Some(event) = self.machine.on_evaluation_trigger(&mut self.timers) {
            self.dispatch_event(event).await;
        }
    }

    fn teardown(&mut self) {
        self.machine.teardown(&mut self.timers);
        self.timers.cancel_all();
        self.tracker.log_summary();
        info!(
            "PHY task stopped: {} on {}, {} frames buffered, total tower load {}",
            self.terminal_id,
            self.machine.serving_tower(),
            self.buffers.total_frames(),
            self.loads.total()
        );
    }
}

#[async_trait::async_trait]
impl Task for PhyTask {
    type Message = PhyMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!(
            "PHY task starting: {} attached to {} ({} towers)",
            self.terminal_id,
            self.machine.serving_tower(),
            self.config.num_towers
        );

        let mut tick_timer = interval(self.config.tick());
        let mut evaluation_timer = interval(self.config.broadcast_interval());

        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    match msg {
                        TaskMessage::Message(phy_msg) => self.handle_message(phy_msg).await,
                        TaskMessage::Shutdown => {
                            info!("PHY task received shutdown signal");
                            break;
                        }
                    }
                }
                _ = tick_timer.tick() => self.on_tick().await,
                _ = evaluation_timer.tick() => self.on_evaluation().await,
            }
        }
        self.teardown();
    }
}
