//! Row selection: which rows a run visits and how they split into chunks.
//!
//! | Selector             | Rows                                   | Chunk boundaries     |
//! |----------------------|----------------------------------------|----------------------|
//! | [`RangeSelector`]    | a dense id range                       | every `chunk_size`   |
//! | [`GroupedSelector`]  | caller-supplied id groups              | one chunk per group  |
//! | [`PresenceSelector`] | rows holding every listed component    | every `chunk_size`   |

use std::ops::Range;
use std::sync::Arc;

use tb_core::{ChunkId, RowId};
use tb_session::{ComponentId, ComponentRegistry};
use tb_store::{Store, StoreView};

use crate::Chunk;

pub trait Selector: Send + Sync {
    /// Partition the selected rows.  Rows within a chunk ascend.
    fn chunks(&self) -> Vec<Chunk>;
}

// ── RangeSelector ─────────────────────────────────────────────────────────────

pub struct RangeSelector {
    range:      Range<usize>,
    chunk_size: usize,
}

impl RangeSelector {
    pub fn new(range: Range<usize>, chunk_size: usize) -> Self {
        Self { range, chunk_size: chunk_size.max(1) }
    }

    /// Every row below the store's current count.
    pub fn all(store: &Store, chunk_size: usize) -> Self {
        Self::new(0..store.count(), chunk_size)
    }
}

impl Selector for RangeSelector {
    fn chunks(&self) -> Vec<Chunk> {
        let Range { start, end } = self.range.clone();
        (start..end)
            .step_by(self.chunk_size)
            .enumerate()
            .map(|(i, from)| Chunk::range(ChunkId(i as u32), from..(from + self.chunk_size).min(end)))
            .collect()
    }
}

// ── GroupedSelector ───────────────────────────────────────────────────────────

/// Explicit groups, e.g. one per household or region.
#[derive(Default)]
pub struct GroupedSelector {
    groups: Vec<(Option<Arc<str>>, Arc<[RowId]>)>,
}

impl GroupedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk.  Rows are sorted and deduplicated.
    pub fn group(mut self, label: Option<&str>, rows: impl IntoIterator<Item = RowId>) -> Self {
        let mut rows: Vec<RowId> = rows.into_iter().filter(|r| !r.is_absent()).collect();
        rows.sort_unstable();
        rows.dedup();
        self.groups.push((label.map(Arc::from), rows.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Selector for GroupedSelector {
    fn chunks(&self) -> Vec<Chunk> {
        self.groups
            .iter()
            .enumerate()
            .map(|(i, (label, rows))| {
                Chunk::list(ChunkId(i as u32), Arc::clone(rows), 0..rows.len(), label.clone())
            })
            .collect()
    }
}

// ── PresenceSelector ──────────────────────────────────────────────────────────

/// Rows where every listed component is present, evaluated when the run
/// starts.
pub struct PresenceSelector {
    registry:   Arc<ComponentRegistry>,
    components: Vec<ComponentId>,
    chunk_size: usize,
}

impl PresenceSelector {
    pub fn new(registry: Arc<ComponentRegistry>, components: &[ComponentId], chunk_size: usize) -> Self {
        Self { registry, components: components.to_vec(), chunk_size: chunk_size.max(1) }
    }
}

impl Selector for PresenceSelector {
    fn chunks(&self) -> Vec<Chunk> {
        let rows: Arc<[RowId]> = self
            .registry
            .store()
            .row_ids()
            .filter(|&row| self.components.iter().all(|&c| self.registry.is_present(c, row)))
            .collect();
        tracing::trace!(matched = rows.len(), components = self.components.len(), "presence scan");
        (0..rows.len())
            .step_by(self.chunk_size)
            .enumerate()
            .map(|(i, from)| {
                let to = (from + self.chunk_size).min(rows.len());
                Chunk::list(ChunkId(i as u32), Arc::clone(&rows), from..to, None)
            })
            .collect()
    }
}
