//! Graphical resource bookkeeping
//!
//! Every renderable primitive (effect ring, glow, hump, projectile mesh,
//! orbit path) holds one [`ResourceHandle`]. The presentation layer uploads
//! and frees GPU buffers keyed by handle; the ledger makes leaks and
//! double-frees observable from the simulation side.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque id of a mesh+material pair owned by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceHandle(u64);

/// Tracks which handles are live
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    live: BTreeSet<ResourceHandle>,
    next_id: u64,
    allocated_total: u64,
    released_total: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle
    pub fn allocate(&mut self) -> ResourceHandle {
        self.next_id += 1;
        let handle = ResourceHandle(self.next_id);
        self.live.insert(handle);
        self.allocated_total += 1;
        handle
    }

    /// Release a handle. Returns `false` (and logs) if it was not live.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        if self.live.remove(&handle) {
            self.released_total += 1;
            true
        } else {
            log::warn!("Resource {} released twice or never allocated", handle.0);
            false
        }
    }

    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.live.contains(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn allocated_total(&self) -> u64 {
        self.allocated_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_release() {
        let mut ledger = ResourceLedger::new();
        let a = ledger.allocate();
        let b = ledger.allocate();
        assert_ne!(a, b);
        assert_eq!(ledger.live_count(), 2);

        assert!(ledger.release(a));
        assert!(!ledger.is_live(a));
        assert!(ledger.is_live(b));
        assert_eq!(ledger.live_count(), 1);
    }

    #[test]
    fn test_double_release_rejected() {
        let mut ledger = ResourceLedger::new();
        let a = ledger.allocate();
        assert!(ledger.release(a));
        assert!(!ledger.release(a));
        assert_eq!(ledger.released_total(), 1);
        assert_eq!(ledger.allocated_total(), 1);
    }
}
