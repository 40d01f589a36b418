//! towersim terminal simulator
//!
//! Main binary for the terminal-side simulator. It implements:
//! - CLI argument parsing
//! - Configuration loading and validation
//! - PHY task spawning and a scripted radio environment
//! - Graceful shutdown handling
//!
//! # Usage
//!
//! ```bash
//! towersim-terminal -c config/terminal.yaml
//! towersim-terminal -c config/terminal.yaml -d 10 -o measurements.csv
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use towersim_common::{init_logging, Coord, LogLevel, TerminalConfig, TowerId};
use towersim_terminal::phy::{DelimitedRecorder, PredictiveDistanceAdapter, StubPositionSource};
use towersim_terminal::{PhyIndication, PhyMessage, PhyTask, Task, TaskMessage};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// towersim terminal - cellular handover simulator
#[derive(Parser, Debug)]
#[command(name = "towersim-terminal")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the terminal configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<String>,

    /// Run duration in seconds
    #[arg(short = 'd', long = "duration", value_name = "SECS", default_value_t = 5)]
    duration: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Write per-observation measurements to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    let config = match load_config(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config, args.duration, args.output.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Terminal failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&str>) -> Result<TerminalConfig, towersim_common::Error> {
    match path {
        Some(path) => TerminalConfig::load(path),
        None => {
            let config = TerminalConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn run(
    config: TerminalConfig,
    duration_secs: u64,
    output: Option<&str>,
) -> Result<(), towersim_common::Error> {
    info!(
        "Starting terminal {} in a {}-tower environment",
        config.terminal_id, config.num_towers
    );

    let (indication_tx, mut indication_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let (phy_tx, phy_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let mut phy = PhyTask::new(config.clone(), indication_tx).with_predictor(
        PredictiveDistanceAdapter::new(Box::new(StubPositionSource {
            position: Coord { x: 0.0, y: 0.0 },
        })),
    );
    if let Some(path) = output {
        let file = std::fs::File::create(path)?;
        phy = phy.with_recorder(Box::new(DelimitedRecorder::new(file)));
        info!("Recording measurements to {path}");
    }

    let phy_handle = tokio::spawn(async move { phy.run(phy_rx).await });

    let env_tx = phy_tx.clone();
    let env_config = config.clone();
    let environment = tokio::spawn(async move { drive_environment(env_config, env_tx).await });

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {
            info!("Run duration elapsed");
        }
        _ = signal::ctrl_c() => {
            info!("Interrupt received");
        }
        Some(indication) = async {
            loop {
                match indication_rx.recv().await {
                    Some(indication) => {
                        report_indication(&indication);
                        if matches!(indication, PhyIndication::Detached { .. }) {
                            break Some(indication);
                        }
                    }
                    None => break None,
                }
            }
        } => {
            warn!("Terminal detached, stopping: {indication:?}");
        }
    }

    environment.abort();
    if phy_tx.send(TaskMessage::shutdown()).await.is_err() {
        warn!("PHY task already stopped");
    }
    if phy_handle.await.is_err() {
        warn!("PHY task panicked");
    }
    Ok(())
}

fn report_indication(indication: &PhyIndication) {
    match indication {
        PhyIndication::HandoverStarted { from, to } => {
            info!("Handover started: {from} -> {to}");
        }
        PhyIndication::HandoverAborted { candidate } => {
            info!("Handover aborted towards {candidate}");
        }
        PhyIndication::HandoverCompleted {
            old_tower,
            new_tower,
            latency,
        } => {
            info!("Handover completed: {old_tower} -> {new_tower} in {latency:?}");
        }
        PhyIndication::Detached { tower, rssi } => {
            warn!("Detached from {tower} at rssi {rssi:.3}");
        }
    }
}

/// Scripted radio environment: the serving tower fades while a neighbor
/// strengthens, so a run exercises at least one handover.
async fn drive_environment(config: TerminalConfig, tx: mpsc::Sender<TaskMessage<PhyMessage>>) {
    let mut broadcast = tokio::time::interval(config.broadcast_interval());
    // this future lives in a spawned task, so the rng must be Send
    let mut rng = StdRng::from_entropy();
    let mut cycle = 0u64;

    loop {
        broadcast.tick().await;
        cycle += 1;

        for tower in 0..config.num_towers {
            let fading = (cycle as f64) * 0.2;
            let base = match tower {
                0 => (20.0 - fading).max(2.0),
                _ => 8.0 + fading / f64::from(tower),
            };
            let rssi = (base + rng.gen_range(-0.5..0.5)).max(0.0);
            let load = rng.gen_range(0..50);
            let msg = PhyMessage::Observation {
                tower: TowerId(tower),
                rssi,
                load,
                tower_position: Some(Coord {
                    x: f64::from(tower) * 500.0,
                    y: 250.0,
                }),
            };
            if tx.send(TaskMessage::message(msg)).await.is_err() {
                return;
            }
        }
    }
}
