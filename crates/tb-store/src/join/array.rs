//! Array-indirection join: each owner row holds an int-list of child rows.

use std::sync::Arc;

use tb_core::{ABSENT, RowId};

use super::{Join, JoinKind, Sizing};
use crate::column::{Attribute, IntListColumn};
use crate::{Store, StoreResult, StoreView};

pub struct ArrayJoin {
    name:   String,
    ids:    Arc<IntListColumn>,
    target: Arc<Store>,
    sizing: Sizing,
}

impl ArrayJoin {
    /// Declare the `<name>` int-list on `owner` and register the join there.
    pub fn attach(
        owner:  &dyn StoreView,
        name:   &str,
        target: Arc<Store>,
        sizing: Sizing,
    ) -> StoreResult<Arc<ArrayJoin>> {
        let ids = owner.add_int_list(name)?;
        let join = Arc::new(ArrayJoin { name: name.to_owned(), ids, target, sizing });
        owner.register_join(name, Arc::clone(&join) as Arc<dyn Join>);
        Ok(join)
    }

    /// Slots reserved for `owner` (used or not).
    pub fn capacity(&self, owner: RowId) -> usize {
        self.ids.get_size(owner)
    }
}

impl Join for ArrayJoin {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> JoinKind {
        JoinKind::Array
    }

    fn get_row(&self, owner: RowId, index: usize) -> RowId {
        RowId::from_raw(self.ids.get(owner, index))
    }

    fn set_size(&self, owner: RowId, size: usize) -> StoreResult<()> {
        // Work on a copy: allocating child rows may grow columns, and the
        // target can be the owner store itself.
        let mut slots: Vec<i32> = Vec::with_capacity(self.ids.get_size(owner));
        self.ids.load_ints(owner, |v| slots.push(v));
        let reserved = slots.len();

        if size > reserved {
            slots.resize(self.sizing.reserve(size), ABSENT);
        }

        let mut changed = false;
        for (i, slot) in slots.iter_mut().enumerate() {
            if i < size && *slot == ABSENT {
                let child = self.target.allocate();
                self.target.erase_row(child);
                *slot = child.0;
                changed = true;
            } else if i >= size && *slot != ABSENT {
                self.target.release(RowId(*slot));
                *slot = ABSENT;
                changed = true;
            }
        }

        if slots.len() != reserved {
            tracing::trace!(join = %self.name, %owner, from = reserved, to = slots.len(), "array join grown");
            self.ids.set_ints(owner, &slots);
        } else if changed {
            self.ids.update(owner, |cells| cells.copy_from_slice(&slots));
        }
        Ok(())
    }

    fn exact_size(&self, owner: RowId) -> usize {
        let mut size = 0;
        let mut done = false;
        self.ids.load_ints(owner, |v| {
            if !done && v != ABSENT {
                size += 1;
            } else {
                done = true;
            }
        });
        size
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        vec![Arc::clone(&self.ids) as Arc<dyn Attribute>]
    }

    fn target(&self) -> &Arc<Store> {
        &self.target
    }
}
