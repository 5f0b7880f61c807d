//! Per-engine table of component accessors.
//!
//! # Design
//!
//! Accessors are registered once, before any session exists, and live in an
//! arena indexed by [`ComponentId`].  Registration hands back a typed
//! [`ComponentKey<A>`] that sessions use to reach the accessor and the
//! matching cache column by index; nothing is looked up by type at runtime.
//!
//! ```ignore
//! let mut builder = ComponentRegistry::builder(Arc::clone(&people));
//! let health = builder.register(HealthAccessor::default())?;
//! let registry = builder.build();
//!
//! let mut session = Session::new(registry, 1024);
//! let e = session.get_entity(RowId(0));
//! let hp = session.get(e, health)?.map(|h| h.hp);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tb_core::RowId;
use tb_store::{Store, StoreView};

use crate::session::{SessionColumn, TypedColumn};
use crate::{ComponentAccessor, SessionError, SessionResult};

// ── Ids and keys ──────────────────────────────────────────────────────────────

/// Untyped index of a registered component.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ComponentId(pub u32);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Typed handle to a registered accessor `A`.
pub struct ComponentKey<A> {
    id:      ComponentId,
    _marker: PhantomData<fn() -> A>,
}

impl<A> ComponentKey<A> {
    fn new(index: usize) -> Self {
        Self { id: ComponentId(index as u32), _marker: PhantomData }
    }

    #[inline]
    pub fn id(self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn index(self) -> usize {
        self.id.index()
    }
}

impl<A> Clone for ComponentKey<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for ComponentKey<A> {}

impl<A> fmt::Debug for ComponentKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKey({})", self.id.0)
    }
}

// ── Type-erased entries ───────────────────────────────────────────────────────

pub(crate) trait ComponentEntry: Send + Sync {
    fn name(&self) -> &str;

    fn is_present(&self, row: RowId) -> bool;

    fn erase(&self, row: RowId);

    fn ensure_capacity(&self, n: usize);

    fn new_column(&self, capacity: usize) -> Box<dyn SessionColumn>;

    fn as_any(&self) -> &dyn Any;
}

struct Registered<A>(Arc<A>);

impl<A: ComponentAccessor> ComponentEntry for Registered<A> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn is_present(&self, row: RowId) -> bool {
        self.0.is_present(row)
    }

    fn erase(&self, row: RowId) {
        self.0.erase(row);
    }

    fn ensure_capacity(&self, n: usize) {
        self.0.ensure_capacity(n);
    }

    fn new_column(&self, capacity: usize) -> Box<dyn SessionColumn> {
        Box::new(TypedColumn::new(Arc::clone(&self.0), capacity))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── ComponentRegistry ─────────────────────────────────────────────────────────

/// Accessors bound to one store, shared by every session over it.
pub struct ComponentRegistry {
    store:   Arc<Store>,
    entries: Vec<Arc<dyn ComponentEntry>>,
}

impl ComponentRegistry {
    pub fn builder(store: Arc<Store>) -> ComponentRegistryBuilder {
        ComponentRegistryBuilder { store, entries: Vec::new() }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + use<> {
        (0..self.entries.len() as u32).map(ComponentId)
    }

    pub fn id_of(&self, name: &str) -> Option<ComponentId> {
        self.entries
            .iter()
            .position(|e| e.name() == name)
            .map(|i| ComponentId(i as u32))
    }

    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.entries.get(id.index()).map(|e| e.name())
    }

    /// The accessor behind `key`.
    pub fn accessor<A: ComponentAccessor>(&self, key: ComponentKey<A>) -> SessionResult<&A> {
        self.entries
            .get(key.index())
            .and_then(|e| e.as_any().downcast_ref::<Registered<A>>())
            .map(|r| r.0.as_ref())
            .ok_or(SessionError::UnknownComponent(key.index()))
    }

    /// `true` if component `id` is stored at `row`; `false` for unknown ids.
    pub fn is_present(&self, id: ComponentId, row: RowId) -> bool {
        self.entries.get(id.index()).is_some_and(|e| e.is_present(row))
    }

    /// Grow the store and every accessor's columns to `n` rows.
    pub fn ensure_capacity(&self, n: usize) {
        self.store.ensure_capacity(n);
        for entry in &self.entries {
            entry.ensure_capacity(n);
        }
    }

    /// Remove every registered component from `row`.
    pub fn erase(&self, row: RowId) {
        for entry in &self.entries {
            entry.erase(row);
        }
    }

    pub(crate) fn new_columns(&self, capacity: usize) -> Vec<Box<dyn SessionColumn>> {
        self.entries.iter().map(|e| e.new_column(capacity)).collect()
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

pub struct ComponentRegistryBuilder {
    store:   Arc<Store>,
    entries: Vec<Arc<dyn ComponentEntry>>,
}

impl ComponentRegistryBuilder {
    /// Configure `accessor` against the store, bind it and return its key.
    ///
    /// Names must be unique within one registry.
    pub fn register<A: ComponentAccessor>(&mut self, mut accessor: A) -> SessionResult<ComponentKey<A>> {
        if self.entries.iter().any(|e| e.name() == accessor.name()) {
            return Err(SessionError::DuplicateComponent(accessor.name().to_owned()));
        }
        accessor.configure_store(&self.store)?;
        accessor.attach_store(&self.store)?;
        accessor.ensure_capacity(self.store.count());

        let key = ComponentKey::new(self.entries.len());
        tracing::debug!(store = %self.store.name(), component = accessor.name(), index = key.index(), "registered component");
        self.entries.push(Arc::new(Registered(Arc::new(accessor))));
        Ok(key)
    }

    pub fn build(self) -> Arc<ComponentRegistry> {
        Arc::new(ComponentRegistry { store: self.store, entries: self.entries })
    }
}
