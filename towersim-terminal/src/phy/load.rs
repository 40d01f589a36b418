//! Tower load bookkeeping.
//!
//! Towers advertise their current load in every broadcast; the terminal
//! keeps the latest value per tower for measurement export and for the
//! end-of-run summary.

use towersim_common::{Error, TowerId};

/// Latest advertised load per tower, indexed by tower id.
#[derive(Debug, Clone)]
pub struct TowerLoadTable {
    loads: Vec<u32>,
}

impl TowerLoadTable {
    /// Creates a table for towers `0..num_towers`, all loads zero.
    pub fn new(num_towers: usize) -> Self {
        Self {
            loads: vec![0; num_towers],
        }
    }

    pub fn num_towers(&self) -> usize {
        self.loads.len()
    }

    /// Records `tower`'s advertised load. An out-of-range id is a
    /// misconfigured environment, reported as an error.
    pub fn record(&mut self, tower: TowerId, load: u32) -> Result<(), Error> {
        let slot = self
            .loads
            .get_mut(tower.value() as usize)
            .ok_or_else(|| Error::StateMachine(format!("unknown {tower} in load report")))?;
        *slot = load;
        Ok(())
    }

    /// Latest load for `tower`, zero if never reported or out of range.
    pub fn load(&self, tower: TowerId) -> u32 {
        self.loads.get(tower.value() as usize).copied().unwrap_or(0)
    }

    /// Sum of the latest loads across all towers.
    pub fn total(&self) -> u64 {
        self.loads.iter().map(|&l| u64::from(l)).sum()
    }
}
