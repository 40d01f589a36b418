//! PHY task scenarios over its channels.
//!
//! These run the real task loop under tokio's paused clock, so interval
//! cadences fire deterministically and fast.

use std::time::Duration;

use integration_tests::{init_test_logging, DEFAULT_TEST_TIMEOUT};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use towersim_common::{HandoverConfig, LinkDirection, TerminalConfig, TerminalId, TowerId};
use towersim_terminal::{PhyIndication, PhyMessage, PhyTask, Task, TaskMessage};

fn config() -> TerminalConfig {
    TerminalConfig {
        terminal_id: TerminalId(7),
        initial_tower: TowerId(0),
        num_towers: 3,
        broadcast_interval_ms: 100,
        tick_ms: 1,
        handover: HandoverConfig {
            enable_handover: true,
            hysteresis_factor: 5.0,
            handover_delta_ms: 10,
            handover_detachment_ms: 40,
            handover_attachment_ms: 60,
            min_rssi: 1.0,
        },
    }
}

struct TaskHarness {
    phy_tx: mpsc::Sender<TaskMessage<PhyMessage>>,
    indication_rx: mpsc::Receiver<PhyIndication>,
    handle: tokio::task::JoinHandle<()>,
}

fn spawn_task(config: TerminalConfig) -> TaskHarness {
    init_test_logging();
    let (indication_tx, indication_rx) = mpsc::channel(64);
    let (phy_tx, phy_rx) = mpsc::channel(64);
    let mut task = PhyTask::new(config, indication_tx);
    let handle = tokio::spawn(async move { task.run(phy_rx).await });
    TaskHarness {
        phy_tx,
        indication_rx,
        handle,
    }
}

impl TaskHarness {
    async fn observe(&self, tower: TowerId, rssi: f64) {
        self.phy_tx
            .send(TaskMessage::message(PhyMessage::Observation {
                tower,
                rssi,
                load: 0,
                tower_position: None,
            }))
            .await
            .expect("task gone");
    }

    async fn next_indication(&mut self) -> PhyIndication {
        timeout(DEFAULT_TEST_TIMEOUT, self.indication_rx.recv())
            .await
            .expect("timed out waiting for indication")
            .expect("indication channel closed")
    }

    async fn shutdown(self) {
        let _ = self.phy_tx.send(TaskMessage::shutdown()).await;
        let _ = self.handle.await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_task_completes_handover_end_to_end() {
    let mut harness = spawn_task(config());

    harness.observe(TowerId(0), 10.0).await;
    harness.observe(TowerId(1), 14.0).await;

    assert_eq!(
        harness.next_indication().await,
        PhyIndication::HandoverStarted {
            from: TowerId(0),
            to: TowerId(1)
        }
    );
    assert_eq!(
        harness.next_indication().await,
        PhyIndication::HandoverCompleted {
            old_tower: TowerId(0),
            new_tower: TowerId(1),
            latency: Duration::from_millis(110),
        }
    );

    let (reply_tx, reply_rx) = oneshot::channel();
    harness
        .phy_tx
        .send(TaskMessage::message(PhyMessage::GetStatus { reply: reply_tx }))
        .await
        .expect("task gone");
    let status = timeout(DEFAULT_TEST_TIMEOUT, reply_rx)
        .await
        .expect("timed out")
        .expect("no status reply");
    assert_eq!(status.serving_tower, TowerId(1));
    assert!(!status.detached);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_task_reports_detach() {
    let mut harness = spawn_task(config());

    harness.observe(TowerId(0), 0.3).await;
    assert_eq!(
        harness.next_indication().await,
        PhyIndication::Detached {
            tower: TowerId(0),
            rssi: 0.3
        }
    );
    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_task_tracks_cqi_statistics() {
    let mut harness = spawn_task(config());

    for value in [4u16, 6, 8] {
        harness
            .phy_tx
            .send(TaskMessage::message(PhyMessage::CqiReport {
                direction: LinkDirection::Downlink,
                value,
            }))
            .await
            .expect("task gone");
    }

    let (reply_tx, reply_rx) = oneshot::channel();
    harness
        .phy_tx
        .send(TaskMessage::message(PhyMessage::GetStatus { reply: reply_tx }))
        .await
        .expect("task gone");
    let status = timeout(DEFAULT_TEST_TIMEOUT, reply_rx)
        .await
        .expect("timed out")
        .expect("no status reply");
    assert_eq!(status.mean_downlink_cqi, 6.0);
    assert_eq!(status.mean_uplink_cqi, 0.0);

    harness.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_task_survives_weak_neighbor() {
    let mut harness = spawn_task(config());

    harness.observe(TowerId(0), 10.0).await;
    harness.observe(TowerId(1), 11.0).await; // below the margin

    // no handover indications: the next thing we see is the status reply
    let (reply_tx, reply_rx) = oneshot::channel();
    harness
        .phy_tx
        .send(TaskMessage::message(PhyMessage::GetStatus { reply: reply_tx }))
        .await
        .expect("task gone");
    let status = timeout(DEFAULT_TEST_TIMEOUT, reply_rx)
        .await
        .expect("timed out")
        .expect("no status reply");
    assert_eq!(status.serving_tower, TowerId(0));

    assert!(harness.indication_rx.try_recv().is_err());
    harness.shutdown().await;
}
