//! Per-connection buffer store and handover reconciliation.
//!
//! While attached, data addressed to the terminal accumulates in
//! per-(terminal, tower) buffers. After a handover commits, buffers keyed
//! by the old serving tower are stale; leaving them behind leaks memory
//! and risks delivering frames from a tower the terminal already left.
//! [`ReconcileBuffers`] is the seam the state-machine owner calls on
//! every [`HandoverEvent::Completed`](crate::phy::HandoverEvent).

use std::collections::HashMap;

use bytes::Bytes;
use towersim_common::{TerminalId, TowerId};
use tracing::{debug, trace};

/// Consistency hook invoked after a handover commits.
///
/// Implementations must be idempotent: the driver may deliver the same
/// completion more than once, and reconciling an already-clean pair is a
/// no-op.
pub trait ReconcileBuffers {
    /// Drops all buffered data for `terminal` keyed by `old_tower`.
    fn reconcile(&mut self, terminal: TerminalId, old_tower: TowerId);
}

/// In-memory per-(terminal, tower) buffer store.
#[derive(Debug, Default)]
pub struct ConnectionBufferStore {
    buffers: HashMap<(TerminalId, TowerId), Vec<Bytes>>,
}

impl ConnectionBufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame to the buffer for `(terminal, tower)`, creating it
    /// on first use.
    pub fn push(&mut self, terminal: TerminalId, tower: TowerId, payload: Bytes) {
        trace!("Buffering {} bytes for {terminal} via {tower}", payload.len());
        self.buffers
            .entry((terminal, tower))
            .or_default()
            .push(payload);
    }

    /// Number of buffered frames for `(terminal, tower)`.
    pub fn len(&self, terminal: TerminalId, tower: TowerId) -> usize {
        self.buffers
            .get(&(terminal, tower))
            .map_or(0, Vec::len)
    }

    /// Total buffered frames across all pairs.
    pub fn total_frames(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }

    /// Drains and returns the buffered frames for `(terminal, tower)`.
    pub fn drain(&mut self, terminal: TerminalId, tower: TowerId) -> Vec<Bytes> {
        self.buffers
            .remove(&(terminal, tower))
            .unwrap_or_default()
    }
}

impl ReconcileBuffers for ConnectionBufferStore {
    fn reconcile(&mut self, terminal: TerminalId, old_tower: TowerId) {
        match self.buffers.remove(&(terminal, old_tower)) {
            Some(frames) => {
                debug!(
                    "Reconciled {} stale frames for {terminal} via {old_tower}",
                    frames.len()
                );
            }
            None => {
                debug!("No buffers to reconcile for {terminal} via {old_tower}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let mut store = ConnectionBufferStore::new();
        let term = TerminalId(1);
        store.push(term, TowerId(0), Bytes::from_static(b"a"));
        store.push(term, TowerId(0), Bytes::from_static(b"b"));
        assert_eq!(store.len(term, TowerId(0)), 2);

        let frames = store.drain(term, TowerId(0));
        assert_eq!(frames.len(), 2);
        assert_eq!(store.len(term, TowerId(0)), 0);
    }

    #[test]
    fn test_reconcile_removes_only_old_tower() {
        let mut store = ConnectionBufferStore::new();
        let term = TerminalId(1);
        store.push(term, TowerId(0), Bytes::from_static(b"stale"));
        store.push(term, TowerId(1), Bytes::from_static(b"fresh"));

        store.reconcile(term, TowerId(0));
        assert_eq!(store.len(term, TowerId(0)), 0);
        assert_eq!(store.len(term, TowerId(1)), 1);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut store = ConnectionBufferStore::new();
        let term = TerminalId(1);
        store.push(term, TowerId(0), Bytes::from_static(b"x"));

        store.reconcile(term, TowerId(0));
        store.reconcile(term, TowerId(0));
        store.reconcile(term, TowerId(7)); // never buffered
        assert_eq!(store.total_frames(), 0);
    }
}
