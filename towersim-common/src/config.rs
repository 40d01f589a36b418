//! Configuration structures for towersim terminals
//!
//! Terminal configuration is loaded from YAML and validated once at
//! startup. Validation failures are fatal: a terminal refuses to start
//! with an invalid handover parameterization rather than fall back to
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::types::{TerminalId, TowerId};

/// Handover decision parameters.
///
/// `hysteresis_factor` divides the current serving strength to derive the
/// hysteresis threshold; zero disables the margin entirely (any stronger
/// tower wins), which is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoverConfig {
    /// Master switch for the handover procedure.
    #[serde(default = "default_enable_handover")]
    pub enable_handover: bool,
    /// Divisor applied to the serving strength to derive the hysteresis
    /// threshold. Must be finite and >= 0; 0 means no margin.
    #[serde(default)]
    pub hysteresis_factor: f64,
    /// Delay between the evaluation trigger and commitment, letting all
    /// broadcasts of the current cycle arrive. Must be > 0.
    #[serde(default = "default_handover_delta_ms")]
    pub handover_delta_ms: u64,
    /// Duration of the detachment phase. Must be > 0.
    #[serde(default = "default_handover_detachment_ms")]
    pub handover_detachment_ms: u64,
    /// Duration of the attachment phase. Must be > 0.
    #[serde(default = "default_handover_attachment_ms")]
    pub handover_attachment_ms: u64,
    /// Hard signal floor: a serving strength below this detaches the
    /// terminal regardless of handover progress. Must be finite.
    #[serde(default)]
    pub min_rssi: f64,
}

fn default_enable_handover() -> bool {
    true
}

fn default_handover_delta_ms() -> u64 {
    1
}

fn default_handover_detachment_ms() -> u64 {
    50
}

fn default_handover_attachment_ms() -> u64 {
    50
}

impl Default for HandoverConfig {
    fn default() -> Self {
        Self {
            enable_handover: default_enable_handover(),
            hysteresis_factor: 0.0,
            handover_delta_ms: default_handover_delta_ms(),
            handover_detachment_ms: default_handover_detachment_ms(),
            handover_attachment_ms: default_handover_attachment_ms(),
            min_rssi: 0.0,
        }
    }
}

impl HandoverConfig {
    /// Evaluation-to-commitment window as a duration.
    pub fn handover_delta(&self) -> Duration {
        Duration::from_millis(self.handover_delta_ms)
    }

    /// Detachment phase as a duration.
    pub fn handover_detachment(&self) -> Duration {
        Duration::from_millis(self.handover_detachment_ms)
    }

    /// Attachment phase as a duration.
    pub fn handover_attachment(&self) -> Duration {
        Duration::from_millis(self.handover_attachment_ms)
    }

    /// Total wall time of a committed handover, reported as the handover
    /// latency on completion.
    pub fn handover_latency(&self) -> Duration {
        self.handover_delta() + self.handover_detachment() + self.handover_attachment()
    }

    /// Validates the decision parameters. Called from
    /// [`TerminalConfig::validate`]; errors are fatal at startup.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.hysteresis_factor.is_finite() || self.hysteresis_factor < 0.0 {
            return Err(Error::Config(format!(
                "hysteresis_factor must be finite and >= 0, got {}",
                self.hysteresis_factor
            )));
        }
        if self.handover_delta_ms == 0 {
            return Err(Error::Config("handover_delta_ms must be > 0".into()));
        }
        if self.handover_detachment_ms == 0 {
            return Err(Error::Config("handover_detachment_ms must be > 0".into()));
        }
        if self.handover_attachment_ms == 0 {
            return Err(Error::Config("handover_attachment_ms must be > 0".into()));
        }
        if !self.min_rssi.is_finite() {
            return Err(Error::Config(format!(
                "min_rssi must be finite, got {}",
                self.min_rssi
            )));
        }
        Ok(())
    }
}

/// Mobile terminal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Identifier of this terminal.
    pub terminal_id: TerminalId,
    /// Tower the terminal is attached to at startup.
    pub initial_tower: TowerId,
    /// Number of towers in the deployment; bounds the tower-load table
    /// and validates observed tower ids.
    pub num_towers: u16,
    /// Interval at which towers emit broadcast probes. The evaluation
    /// trigger runs at this cadence and must match the environment's.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    /// Scheduling granularity of the node task.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Handover decision parameters.
    #[serde(default)]
    pub handover: HandoverConfig,
}

fn default_broadcast_interval_ms() -> u64 {
    100
}

fn default_tick_ms() -> u64 {
    1
}

impl TerminalConfig {
    /// Loads a terminal configuration from a YAML file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parses a terminal configuration from a YAML string and validates it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let config: TerminalConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Broadcast cadence as a duration.
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Scheduling tick as a duration.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Validates the whole configuration. Errors are fatal at startup.
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_towers == 0 {
            return Err(Error::Config("num_towers must be > 0".into()));
        }
        if self.initial_tower.value() >= self.num_towers {
            return Err(Error::Config(format!(
                "initial_tower {} out of range (num_towers = {})",
                self.initial_tower, self.num_towers
            )));
        }
        if self.broadcast_interval_ms == 0 {
            return Err(Error::Config("broadcast_interval_ms must be > 0".into()));
        }
        if self.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be > 0".into()));
        }
        if self.tick_ms > self.broadcast_interval_ms {
            return Err(Error::Config(format!(
                "tick_ms ({}) must not exceed broadcast_interval_ms ({})",
                self.tick_ms, self.broadcast_interval_ms
            )));
        }
        self.handover.validate()
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            terminal_id: TerminalId(1),
            initial_tower: TowerId(0),
            num_towers: 5,
            broadcast_interval_ms: default_broadcast_interval_ms(),
            tick_ms: default_tick_ms(),
            handover: HandoverConfig::default(),
        }
    }
}
