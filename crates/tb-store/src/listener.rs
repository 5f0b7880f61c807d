//! Cooperative data-changed notifications.
//!
//! Nothing in a [`Store`] fires these automatically.  Whoever bulk-loads or
//! bulk-invalidates rows calls [`Store::fire_data_changed`] explicitly and may
//! exclude the listener that caused the change.

use std::fmt;

use crate::Store;

/// Handle returned by [`Store::add_listener`], used for removal and for
/// exclusion when firing.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(pub u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Receives `[from, to)` row ranges whose contents changed outside the
/// normal session flush path.
pub trait DataListener: Send + Sync {
    fn data_changed(&self, store: &Store, from: usize, to: usize);
}

impl<F> DataListener for F
where
    F: Fn(&Store, usize, usize) + Send + Sync,
{
    fn data_changed(&self, store: &Store, from: usize, to: usize) {
        self(store, from, to)
    }
}
