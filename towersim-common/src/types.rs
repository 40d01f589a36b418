//! Core identifier and geometry types for towersim
//!
//! Identifier newtypes for towers and terminals, the uplink/downlink
//! direction enum used by CQI tracking, and a small planar coordinate
//! type used by the predictive-distance adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a fixed radio access point (tower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(pub u16);

impl TowerId {
    /// Returns the raw identifier value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tower-{}", self.0)
    }
}

impl From<u16> for TowerId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Identifier of a mobile terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalId(pub u16);

impl TerminalId {
    /// Returns the raw identifier value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminal-{}", self.0)
    }
}

impl From<u16> for TerminalId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Link direction for channel-quality tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkDirection {
    /// Tower to terminal.
    Downlink,
    /// Terminal to tower.
    Uplink,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDirection::Downlink => write!(f, "DL"),
            LinkDirection::Uplink => write!(f, "UL"),
        }
    }
}

/// Planar coordinate, used for predicted terminal positions and tower
/// locations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Creates a new coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another coordinate.
    pub fn distance_to(&self, other: &Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}
