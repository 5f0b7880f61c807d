//! Joins: owner row → 0..N rows of a child store.
//!
//! | Strategy        | Owner bookkeeping                    | Lookup          | Resize                      |
//! |-----------------|--------------------------------------|-----------------|-----------------------------|
//! | [`ArrayJoin`]   | `<name>` int-list of child rows      | O(1)            | per-slot allocate / free    |
//! | [`RangeJoin`]   | `<name>_start` int, `<name>_length` byte | O(1)        | in place, or relocate block |
//! | [`SingleJoin`]  | `<name>` int (forward pointer)       | O(1)            | 0 or 1 child                |
//! | reverse-only    | `reverse` int in the child store     | O(target) scan, then memoized | 0 or 1 child  |
//!
//! Child rows are always erased before they are handed out and before they
//! are returned to the allocator, so a stale pointer never observes data
//! belonging to a different owner.

mod array;
mod range;
mod single;

use std::sync::Arc;

use tb_core::RowId;

use crate::column::Attribute;
use crate::{Store, StoreResult};

pub use array::ArrayJoin;
pub use range::{MAX_EMBEDDED_LEN, MAX_RANGE_LEN, RangeJoin};
pub use single::{REVERSE_COLUMN, SingleJoin, SingleMode};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum JoinKind {
    Array,
    Range,
    Single,
    SingleReverse,
    ReverseOnly,
}

/// Common contract of every join strategy.
pub trait Join: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> JoinKind;

    /// Child row at `index` for `owner`, or `RowId::ABSENT`.
    fn get_row(&self, owner: RowId, index: usize) -> RowId;

    /// Resize the set of child rows owned by `owner`.
    fn set_size(&self, owner: RowId, size: usize) -> StoreResult<()>;

    /// Number of child rows currently in use by `owner`.
    fn exact_size(&self, owner: RowId) -> usize;

    /// Bookkeeping columns to persist alongside the data.
    fn attributes(&self) -> Vec<Arc<dyn Attribute>>;

    /// The child store.
    fn target(&self) -> &Arc<Store>;
}

/// Reservation policy shared by the array and range joins:
/// `reserved = max(size + margin, minimum)`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Sizing {
    pub minimum: usize,
    pub margin:  usize,
}

impl Sizing {
    pub fn new(minimum: usize, margin: usize) -> Self {
        Self { minimum, margin }
    }

    #[inline]
    pub fn reserve(&self, size: usize) -> usize {
        (size + self.margin).max(self.minimum)
    }
}
