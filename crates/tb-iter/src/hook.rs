//! Lifecycle hooks around parallel runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use tb_core::{ChunkId, RowId};
use tb_store::{Store, StoreView};

use crate::{IterError, IterResult};

/// Fired once before and once after every run that executes chunks in
/// parallel.  Sequential runs fire neither.
///
/// All methods default to no-ops.
pub trait ParallelHook: Send + Sync {
    fn pre_parallel(&self, _chunks: usize) {}

    /// Called even when the run fails.
    fn post_parallel(&self) {}
}

// ── ChunkOwnership ────────────────────────────────────────────────────────────

const UNOWNED: u32 = u32::MAX;

/// Per-row "owning chunk" table that detects two chunks touching one row.
///
/// The table exists only between `pre_parallel` and `post_parallel`; outside
/// a parallel run [`claim`](Self::claim) always succeeds.  Rows allocated
/// during the run lie past the table and are not tracked.
pub struct ChunkOwnership {
    store:  Arc<Store>,
    owners: RwLock<Option<Box<[AtomicU32]>>>,
}

impl ChunkOwnership {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, owners: RwLock::new(None) }
    }

    pub fn is_tracking(&self) -> bool {
        self.owners.read().is_some()
    }

    /// Record that `chunk` processes `row`.  Fails if another chunk already
    /// claimed it in this run.
    pub fn claim(&self, row: RowId, chunk: ChunkId) -> IterResult<()> {
        if row.is_absent() {
            return Ok(());
        }
        let owners = self.owners.read();
        let Some(cell) = owners.as_ref().and_then(|o| o.get(row.index())) else {
            return Ok(());
        };
        match cell.compare_exchange(UNOWNED, chunk.0, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(()),
            Err(current) if current == chunk.0 => Ok(()),
            Err(current) => Err(IterError::OwnershipConflict { row, first: ChunkId(current), second: chunk }),
        }
    }

    pub fn owner(&self, row: RowId) -> Option<ChunkId> {
        if row.is_absent() {
            return None;
        }
        let owners = self.owners.read();
        let current = owners.as_ref()?.get(row.index())?.load(Ordering::Acquire);
        (current != UNOWNED).then_some(ChunkId(current))
    }
}

impl ParallelHook for ChunkOwnership {
    fn pre_parallel(&self, chunks: usize) {
        let rows = self.store.count();
        tracing::debug!(store = %self.store.name(), rows, chunks, "tracking chunk ownership");
        *self.owners.write() = Some((0..rows).map(|_| AtomicU32::new(UNOWNED)).collect());
    }

    fn post_parallel(&self) {
        *self.owners.write() = None;
    }
}
