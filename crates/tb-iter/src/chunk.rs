//! Chunks: bounded groups of rows processed by one thread.

use std::ops::Range;
use std::sync::Arc;

use tb_core::{ChunkId, RowId};

/// Identity of a chunk, handed to actions and hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    pub id:    ChunkId,
    pub size:  usize,
    pub label: Option<Arc<str>>,
}

/// A chunk plus its rows.  The rows can be taken once.
#[derive(Debug)]
pub struct Chunk {
    info: ChunkInfo,
    rows: RowIter,
}

impl Chunk {
    /// Rows `[range.start, range.end)`.
    pub fn range(id: ChunkId, range: Range<usize>) -> Self {
        let size = range.len();
        let rows = RowIter::Range(range.start as i32..range.end as i32);
        Self { info: ChunkInfo { id, size, label: None }, rows }
    }

    /// `rows[span]` of a shared, pre-sorted id list.
    pub fn list(id: ChunkId, rows: Arc<[RowId]>, span: Range<usize>, label: Option<Arc<str>>) -> Self {
        let size = span.len();
        Self { info: ChunkInfo { id, size, label }, rows: RowIter::List { rows, span } }
    }

    pub fn info(&self) -> &ChunkInfo {
        &self.info
    }

    pub fn id(&self) -> ChunkId {
        self.info.id
    }

    pub fn size(&self) -> usize {
        self.info.size
    }

    pub fn label(&self) -> Option<&str> {
        self.info.label.as_deref()
    }

    /// The row sequence.  Later calls return an empty iterator.
    pub fn take_rows(&mut self) -> RowIter {
        std::mem::replace(&mut self.rows, RowIter::Empty)
    }
}

#[derive(Debug)]
pub enum RowIter {
    Range(Range<i32>),
    List { rows: Arc<[RowId]>, span: Range<usize> },
    Empty,
}

impl Iterator for RowIter {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        match self {
            RowIter::Range(r) => r.next().map(RowId),
            RowIter::List { rows, span } => span.next().map(|i| rows[i]),
            RowIter::Empty => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            RowIter::Range(r) => r.len(),
            RowIter::List { span, .. } => span.len(),
            RowIter::Empty => 0,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for RowIter {}
