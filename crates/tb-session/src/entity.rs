//! Entity handles.

use std::fmt;

use tb_core::RowId;

/// A handle to one row of the session's store.
///
/// | Variant    | Meaning                                                 | Component access |
/// |------------|---------------------------------------------------------|------------------|
/// | `Cached`   | registered in a session at `index`                      | read / write     |
/// | `Detached` | a previously cached entity outside its session          | fresh loads only |
/// | `Stub`     | a bare reference that no session has touched yet        | none             |
///
/// `Detached` and `Stub` handles are promoted with
/// [`Session::attach`](crate::Session::attach).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Entity {
    Cached { index: u32, id: RowId },
    Detached(RowId),
    Stub(RowId),
}

impl Entity {
    #[inline]
    pub fn id(self) -> RowId {
        match self {
            Entity::Cached { id, .. } | Entity::Detached(id) | Entity::Stub(id) => id,
        }
    }

    #[inline]
    pub fn session_index(self) -> Option<usize> {
        match self {
            Entity::Cached { index, .. } => Some(index as usize),
            _ => None,
        }
    }

    #[inline]
    pub fn is_cached(self) -> bool {
        matches!(self, Entity::Cached { .. })
    }

    /// The same row, no longer tied to a session slot.
    pub fn detach(self) -> Entity {
        Entity::Detached(self.id())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Cached { index, id } => write!(f, "Entity({id}@{index})"),
            Entity::Detached(id) => write!(f, "Entity({id}, detached)"),
            Entity::Stub(id) => write!(f, "Entity({id}, stub)"),
        }
    }
}

/// Turns a stored row reference into a handle while a component loads.
pub trait EntityResolver {
    fn resolve(&mut self, id: RowId) -> Entity;
}
