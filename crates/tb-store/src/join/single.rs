//! At-most-one child per owner, in three flavours.
//!
//! - [`SingleMode::Forward`]: `<name>` int on the owner points at the child.
//! - [`SingleMode::WithReverse`]: as above, plus `reverse` int on the child
//!   pointing back at the owner.
//! - [`SingleMode::ReverseOnly`]: only the child's `reverse` pointer exists.
//!   Lookups go through an owner → child index built by one scan of the
//!   target and dropped whenever the target fires `data_changed`.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tb_core::RowId;

use super::{Join, JoinKind};
use crate::column::{Attribute, IntColumn};
use crate::{Store, StoreError, StoreResult, StoreView};

/// Name of the back-pointer column declared in the child store.
pub const REVERSE_COLUMN: &str = "reverse";

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SingleMode {
    Forward,
    WithReverse,
    ReverseOnly,
}

type Memo = Arc<Mutex<Option<FxHashMap<RowId, RowId>>>>;

pub struct SingleJoin {
    name:    String,
    mode:    SingleMode,
    forward: Option<Arc<IntColumn>>,
    reverse: Option<Arc<IntColumn>>,
    target:  Arc<Store>,
    memo:    Memo,
}

impl SingleJoin {
    pub fn attach(
        owner:  &dyn StoreView,
        name:   &str,
        target: Arc<Store>,
        mode:   SingleMode,
    ) -> StoreResult<Arc<SingleJoin>> {
        let forward = match mode {
            SingleMode::ReverseOnly => None,
            _ => Some(owner.add_int(name)?),
        };
        let reverse = match mode {
            SingleMode::Forward => None,
            _ => Some(target.add_int(REVERSE_COLUMN)?),
        };

        let memo: Memo = Arc::new(Mutex::new(None));
        if mode == SingleMode::ReverseOnly {
            let memo = Arc::clone(&memo);
            target.add_listener(Arc::new(move |_: &Store, _: usize, _: usize| {
                *memo.lock() = None;
            }));
        }

        let join = Arc::new(SingleJoin {
            name: name.to_owned(),
            mode,
            forward,
            reverse,
            target,
            memo,
        });
        owner.register_join(name, Arc::clone(&join) as Arc<dyn Join>);
        Ok(join)
    }

    pub fn mode(&self) -> SingleMode {
        self.mode
    }

    /// The owner a child row belongs to, if a back-pointer is kept.
    pub fn owner_of(&self, child: RowId) -> RowId {
        self.reverse.as_ref().map_or(RowId::ABSENT, |rev| RowId::from_raw(rev.get(child)))
    }

    fn child_of(&self, owner: RowId) -> RowId {
        if let Some(fwd) = &self.forward {
            return RowId::from_raw(fwd.get(owner));
        }
        let mut memo = self.memo.lock();
        let hit = memo.get_or_insert_with(|| self.scan()).get(&owner).copied();
        match hit {
            Some(child) if self.owner_of(child) == owner => child,
            // Freed through the target store, possibly reused since.
            Some(_) => {
                tracing::trace!(join = %self.name, %owner, "stale reverse entry, rescanning");
                let index = memo.insert(self.scan());
                index.get(&owner).copied().unwrap_or(RowId::ABSENT)
            }
            None => RowId::ABSENT,
        }
    }

    fn scan(&self) -> FxHashMap<RowId, RowId> {
        let mut index = FxHashMap::default();
        if let Some(rev) = &self.reverse {
            for child in self.target.row_ids() {
                let owner = RowId::from_raw(rev.get(child));
                if !owner.is_absent() {
                    index.insert(owner, child);
                }
            }
        }
        tracing::trace!(join = %self.name, entries = index.len(), "reverse index built");
        index
    }

    fn remember(&self, owner: RowId, child: RowId) {
        if let Some(index) = self.memo.lock().as_mut() {
            if child.is_absent() {
                index.remove(&owner);
            } else {
                index.insert(owner, child);
            }
        }
    }
}

impl Join for SingleJoin {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> JoinKind {
        match self.mode {
            SingleMode::Forward     => JoinKind::Single,
            SingleMode::WithReverse => JoinKind::SingleReverse,
            SingleMode::ReverseOnly => JoinKind::ReverseOnly,
        }
    }

    fn get_row(&self, owner: RowId, index: usize) -> RowId {
        if index == 0 { self.child_of(owner) } else { RowId::ABSENT }
    }

    fn set_size(&self, owner: RowId, size: usize) -> StoreResult<()> {
        let current = self.child_of(owner);
        match size {
            0 => {
                if !current.is_absent() {
                    self.target.release(current);
                    if let Some(fwd) = &self.forward {
                        fwd.set_empty(owner);
                    }
                    self.remember(owner, RowId::ABSENT);
                }
            }
            1 => {
                let child = if current.is_absent() { self.target.allocate() } else { current };
                self.target.erase_row(child);
                if let Some(fwd) = &self.forward {
                    fwd.set(owner, child.0);
                }
                if let Some(rev) = &self.reverse {
                    rev.set(child, owner.0);
                }
                self.remember(owner, child);
            }
            _ => {
                return Err(StoreError::Contract(format!(
                    "join `{}` holds at most one row, asked for {size}",
                    self.name,
                )));
            }
        }
        Ok(())
    }

    fn exact_size(&self, owner: RowId) -> usize {
        usize::from(!self.child_of(owner).is_absent())
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.forward
            .iter()
            .chain(self.reverse.iter())
            .map(|c| Arc::clone(c) as Arc<dyn Attribute>)
            .collect()
    }

    fn target(&self) -> &Arc<Store> {
        &self.target
    }
}
