//! Contiguous-range join: each owner reserves a block of consecutive child
//! rows, recorded as `<name>_start` and `<name>_length` on the owner.

use std::sync::Arc;

use tb_core::RowId;

use super::{Join, JoinKind, Sizing};
use crate::column::{Attribute, ByteColumn, IntColumn};
use crate::{Store, StoreError, StoreResult, StoreView};

/// Largest block one owner may reserve; the length is a single byte.
pub const MAX_RANGE_LEN: usize = 255;

/// Largest list [`RangeJoin::save_list`] accepts.
pub const MAX_EMBEDDED_LEN: usize = 127;

pub struct RangeJoin {
    name:        String,
    starts:      Arc<IntColumn>,
    lengths:     Arc<ByteColumn>,
    target:      Arc<Store>,
    sizing:      Sizing,
    relocatable: bool,
}

impl RangeJoin {
    /// Declare `<name>_start` / `<name>_length` on `owner` and register the
    /// join there.  Growing past the reserved block is an error unless
    /// `relocatable` is set, in which case the block moves.
    pub fn attach(
        owner:       &dyn StoreView,
        name:        &str,
        target:      Arc<Store>,
        sizing:      Sizing,
        relocatable: bool,
    ) -> StoreResult<Arc<RangeJoin>> {
        let starts = owner.add_int(&format!("{name}_start"))?;
        let lengths = owner.add_byte(&format!("{name}_length"))?;
        let join = Arc::new(RangeJoin {
            name: name.to_owned(),
            starts,
            lengths,
            target,
            sizing,
            relocatable,
        });
        owner.register_join(name, Arc::clone(&join) as Arc<dyn Join>);
        Ok(join)
    }

    pub fn is_relocatable(&self) -> bool {
        self.relocatable
    }

    /// First child row of `owner`'s block, `ABSENT` if none is reserved.
    pub fn start(&self, owner: RowId) -> RowId {
        self.starts.value(owner).map_or(RowId::ABSENT, RowId::from_raw)
    }

    /// Rows reserved for `owner`.
    pub fn capacity(&self, owner: RowId) -> usize {
        if self.starts.value(owner).is_none() {
            return 0;
        }
        self.lengths.get(owner) as u8 as usize
    }

    /// Store `items` in consecutive child rows, writing each with `write`.
    pub fn save_list<T>(
        &self,
        owner:     RowId,
        items:     &[T],
        mut write: impl FnMut(RowId, &T),
    ) -> StoreResult<()> {
        if items.len() > MAX_EMBEDDED_LEN {
            return Err(StoreError::Contract(format!(
                "join `{}`: list of {} exceeds the embedded limit of {MAX_EMBEDDED_LEN}",
                self.name,
                items.len(),
            )));
        }
        self.set_size(owner, items.len())?;
        let start = self.start(owner);
        for (i, item) in items.iter().enumerate() {
            write(start.offset(i), item);
        }
        Ok(())
    }

    /// Read back every child row in use, in order.
    pub fn load_list<T>(&self, owner: RowId, read: impl FnMut(RowId) -> T) -> Vec<T> {
        let start = self.start(owner);
        (0..self.exact_size(owner)).map(|i| start.offset(i)).map(read).collect()
    }

    fn reserve(&self, owner: RowId, size: usize) -> StoreResult<()> {
        let capacity = self.sizing.reserve(size);
        if capacity > MAX_RANGE_LEN {
            return Err(StoreError::Contract(format!(
                "join `{}`: {capacity} rows exceed the range limit of {MAX_RANGE_LEN}",
                self.name,
            )));
        }
        let first = self.target.allocate_block(capacity);
        self.starts.set(owner, first.0);
        self.lengths.set(owner, capacity as u8 as i8);
        Ok(())
    }

    fn release_block(&self, owner: RowId) {
        let start = self.start(owner);
        for i in 0..self.capacity(owner) {
            self.target.release(start.offset(i));
        }
        self.starts.set_empty(owner);
        self.lengths.set_empty(owner);
    }
}

impl Join for RangeJoin {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> JoinKind {
        JoinKind::Range
    }

    fn get_row(&self, owner: RowId, index: usize) -> RowId {
        if index < self.capacity(owner) { self.start(owner).offset(index) } else { RowId::ABSENT }
    }

    fn set_size(&self, owner: RowId, size: usize) -> StoreResult<()> {
        let capacity = self.capacity(owner);
        if capacity == 0 {
            return if size == 0 { Ok(()) } else { self.reserve(owner, size) };
        }

        if size == 0 {
            self.release_block(owner);
            return Ok(());
        }

        if size > capacity {
            if !self.relocatable {
                return Err(StoreError::Contract(format!(
                    "join `{}`: size {size} exceeds the {capacity} rows reserved for {owner}",
                    self.name,
                )));
            }
            tracing::debug!(join = %self.name, %owner, from = capacity, to = size, "relocating range");
            self.release_block(owner);
            return self.reserve(owner, size);
        }

        // Shrinking in place: rows past the new size become empty.
        let start = self.start(owner);
        for i in size..capacity {
            self.target.erase_row(start.offset(i));
        }
        Ok(())
    }

    fn exact_size(&self, owner: RowId) -> usize {
        let start = self.start(owner);
        (0..self.capacity(owner))
            .take_while(|&i| self.target.is_row_present(start.offset(i)))
            .count()
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        vec![
            Arc::clone(&self.starts) as Arc<dyn Attribute>,
            Arc::clone(&self.lengths) as Arc<dyn Attribute>,
        ]
    }

    fn target(&self) -> &Arc<Store> {
        &self.target
    }
}
