//! `Session` — the per-pass cache between user logic and a store.
//!
//! # Layout
//!
//! ```text
//! session index:   0      1      2      …
//! rows:          [r17]  [r3]   [r40]
//! deleted:       [ ]    [x]    [ ]
//! column Health: [Present] [Untouched] [Missing]
//! column Home:   [Untouched] [Present] [Removed]
//! ```
//!
//! An entity gets a slot the first time it is touched.  Each registered
//! component has one cache column of [`Slot`]s parallel to `rows`; a slot
//! loads from the store on first access and stays cached until
//! [`Session::clear`].
//!
//! [`Session::flush`] writes back only slots whose cached value differs from
//! storage (per the accessor's `is_modified`).  Rows marked deleted are
//! skipped by `flush` and erased and freed by `clear`, so they remain
//! readable for the rest of the pass.

use std::any::Any;
use std::ops::AddAssign;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tb_core::RowId;
use tb_store::{Store, StoreView};

use crate::{
    ComponentAccessor, ComponentId, ComponentKey, ComponentRegistry, Entity, EntityResolver,
    SessionError, SessionResult,
};

// ── FlushStats ────────────────────────────────────────────────────────────────

/// What one flush did.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FlushStats {
    /// Modified components written back.
    pub saved:   usize,
    /// Cached components equal to storage, not written.
    pub skipped: usize,
    /// Removed components erased from storage.
    pub erased:  usize,
}

impl AddAssign for FlushStats {
    fn add_assign(&mut self, rhs: FlushStats) {
        self.saved += rhs.saved;
        self.skipped += rhs.skipped;
        self.erased += rhs.erased;
    }
}

// ── Cache columns ─────────────────────────────────────────────────────────────

pub(crate) enum Slot<C> {
    /// Not loaded yet.
    Untouched,
    /// Loaded (or created) and not stored.
    Missing,
    Present(C),
    /// Removed in this session; erased at flush.
    Removed,
}

impl<C> Slot<C> {
    fn value(&self) -> Option<&C> {
        match self {
            Slot::Present(c) => Some(c),
            _ => None,
        }
    }

    fn value_mut(&mut self) -> Option<&mut C> {
        match self {
            Slot::Present(c) => Some(c),
            _ => None,
        }
    }

    fn present_or(&mut self, make: impl FnOnce() -> C) -> &mut C {
        if !matches!(self, Slot::Present(_)) {
            *self = Slot::Present(make());
        }
        match self {
            Slot::Present(c) => c,
            Slot::Untouched | Slot::Missing | Slot::Removed => unreachable!("slot filled above"),
        }
    }
}

pub(crate) trait SessionColumn: Send {
    /// Append a slot for a newly registered entity.
    fn push(&mut self, fresh: bool);

    fn flush(&mut self, rows: &[RowId], deleted: &[bool]) -> SessionResult<FlushStats>;

    fn clear(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct TypedColumn<A: ComponentAccessor> {
    accessor: Arc<A>,
    slots:    Vec<Slot<A::Component>>,
}

impl<A: ComponentAccessor> TypedColumn<A> {
    pub(crate) fn new(accessor: Arc<A>, capacity: usize) -> Self {
        Self { accessor, slots: Vec::with_capacity(capacity) }
    }
}

impl<A: ComponentAccessor> SessionColumn for TypedColumn<A> {
    fn push(&mut self, fresh: bool) {
        self.slots.push(if fresh { Slot::Missing } else { Slot::Untouched });
    }

    fn flush(&mut self, rows: &[RowId], deleted: &[bool]) -> SessionResult<FlushStats> {
        let mut stats = FlushStats::default();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if deleted[i] {
                continue;
            }
            let row = rows[i];
            match slot {
                Slot::Present(component) => {
                    if self.accessor.is_modified(component, row) {
                        self.accessor.save(component, row)?;
                        stats.saved += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
                Slot::Removed => {
                    if self.accessor.is_present(row) {
                        self.accessor.erase(row);
                        stats.erased += 1;
                    }
                    *slot = Slot::Missing;
                }
                Slot::Untouched | Slot::Missing => {}
            }
        }
        Ok(stats)
    }

    fn clear(&mut self) {
        self.slots.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session {
    registry: Arc<ComponentRegistry>,
    rows:     Vec<RowId>,
    deleted:  Vec<bool>,
    index:    FxHashMap<RowId, u32>,
    columns:  Vec<Box<dyn SessionColumn>>,
}

impl Session {
    /// An empty session.  `capacity` is a sizing hint, not a limit.
    pub fn new(registry: Arc<ComponentRegistry>, capacity: usize) -> Self {
        let columns = registry.new_columns(capacity);
        Self {
            registry,
            rows: Vec::with_capacity(capacity),
            deleted: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            columns,
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<Store> {
        self.registry.store()
    }

    /// Number of cached entities.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every cached entity, in the order they were first touched.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, &id)| Entity::Cached { index: i as u32, id })
    }

    // ── Entities ──────────────────────────────────────────────────────────

    /// The cached handle for `id`, registering a slot on first touch.  An
    /// absent id yields a stub.
    pub fn get_entity(&mut self, id: RowId) -> Entity {
        if id.is_absent() {
            return Entity::Stub(id);
        }
        if let Some(&index) = self.index.get(&id) {
            return Entity::Cached { index, id };
        }
        self.register(id, false)
    }

    /// Promote a detached or stub handle into this session.
    pub fn attach(&mut self, entity: Entity) -> Entity {
        self.get_entity(entity.id())
    }

    /// Allocate a fresh row and cache it with no components.
    pub fn create_entity(&mut self) -> Entity {
        let store = Arc::clone(self.registry.store());
        let id = store.allocate();
        self.registry.ensure_capacity(store.count());
        self.register(id, true)
    }

    /// Allocate a fresh row and attach its initial components in one chain:
    ///
    /// ```ignore
    /// let e = session
    ///     .create_entity_with()
    ///     .with(health, Health::default())?
    ///     .with(home, Home { house })?
    ///     .entity();
    /// ```
    pub fn create_entity_with(&mut self) -> EntityBuilder<'_> {
        let entity = self.create_entity();
        EntityBuilder { session: self, entity }
    }

    /// Mark `entity` for deletion.  Its row stays readable until
    /// [`clear`](Self::clear).
    pub fn delete_entity(&mut self, entity: Entity) -> SessionResult<()> {
        let index = self.slot(entity)?;
        self.deleted[index] = true;
        Ok(())
    }

    pub fn is_deleted(&self, entity: Entity) -> bool {
        self.slot(entity).is_ok_and(|i| self.deleted[i])
    }

    fn register(&mut self, id: RowId, fresh: bool) -> Entity {
        let index = self.rows.len() as u32;
        self.rows.push(id);
        self.deleted.push(false);
        self.index.insert(id, index);
        for column in &mut self.columns {
            column.push(fresh);
        }
        Entity::Cached { index, id }
    }

    fn slot(&self, entity: Entity) -> SessionResult<usize> {
        match entity {
            Entity::Cached { index, id } if self.rows.get(index as usize) == Some(&id) => {
                Ok(index as usize)
            }
            other => Err(SessionError::NotCached(other.id())),
        }
    }

    fn live_slot(&self, entity: Entity) -> SessionResult<usize> {
        let index = self.slot(entity)?;
        if self.deleted[index] {
            return Err(SessionError::Deleted(entity.id()));
        }
        Ok(index)
    }

    // ── Components ────────────────────────────────────────────────────────

    fn column<A: ComponentAccessor>(&mut self, key: ComponentKey<A>) -> SessionResult<&mut TypedColumn<A>> {
        self.columns
            .get_mut(key.index())
            .and_then(|c| c.as_any_mut().downcast_mut::<TypedColumn<A>>())
            .ok_or(SessionError::UnknownComponent(key.index()))
    }

    fn load<A: ComponentAccessor>(&mut self, index: usize, key: ComponentKey<A>) -> SessionResult<()> {
        let column = self.column(key)?;
        if !matches!(column.slots[index], Slot::Untouched) {
            return Ok(());
        }
        let accessor = Arc::clone(&column.accessor);
        let row = self.rows[index];
        let slot = if accessor.is_present(row) {
            let mut component = accessor.create();
            accessor.load(&mut *self, &mut component, row)?;
            Slot::Present(component)
        } else {
            Slot::Missing
        };
        self.column(key)?.slots[index] = slot;
        Ok(())
    }

    /// The cached component, loading it on first access.  `None` if absent.
    pub fn get<A: ComponentAccessor>(
        &mut self,
        entity: Entity,
        key:    ComponentKey<A>,
    ) -> SessionResult<Option<&A::Component>> {
        let index = self.slot(entity)?;
        self.load(index, key)?;
        Ok(self.column(key)?.slots[index].value())
    }

    /// Mutable access to the cached component.  Changes reach storage at
    /// the next flush.
    pub fn get_mut<A: ComponentAccessor>(
        &mut self,
        entity: Entity,
        key:    ComponentKey<A>,
    ) -> SessionResult<Option<&mut A::Component>> {
        let index = self.slot(entity)?;
        self.load(index, key)?;
        Ok(self.column(key)?.slots[index].value_mut())
    }

    /// The cached component, creating a default one if absent.
    pub fn get_or_create<A: ComponentAccessor>(
        &mut self,
        entity: Entity,
        key:    ComponentKey<A>,
    ) -> SessionResult<&mut A::Component> {
        let index = self.live_slot(entity)?;
        self.load(index, key)?;
        let column = self.column(key)?;
        let accessor = Arc::clone(&column.accessor);
        Ok(column.slots[index].present_or(|| accessor.create()))
    }

    pub fn has<A: ComponentAccessor>(&mut self, entity: Entity, key: ComponentKey<A>) -> SessionResult<bool> {
        Ok(self.get(entity, key)?.is_some())
    }

    /// Cache `component` for `entity`, replacing any previous value.  No
    /// storage access until flush.
    pub fn add<A: ComponentAccessor>(
        &mut self,
        entity:    Entity,
        key:       ComponentKey<A>,
        component: A::Component,
    ) -> SessionResult<()> {
        let index = self.live_slot(entity)?;
        self.column(key)?.slots[index] = Slot::Present(component);
        Ok(())
    }

    /// Drop the component from `entity`; the stored copy is erased at flush.
    pub fn remove<A: ComponentAccessor>(&mut self, entity: Entity, key: ComponentKey<A>) -> SessionResult<()> {
        let index = self.live_slot(entity)?;
        self.column(key)?.slots[index] = Slot::Removed;
        Ok(())
    }

    /// Load a fresh copy straight from storage, bypassing the cache.  Works
    /// for detached handles too.
    pub fn load_detached<A: ComponentAccessor>(
        &mut self,
        entity: Entity,
        key:    ComponentKey<A>,
    ) -> SessionResult<Option<A::Component>> {
        let accessor = Arc::clone(&self.column(key)?.accessor);
        let row = entity.id();
        if row.is_absent() || !accessor.is_present(row) {
            return Ok(None);
        }
        let mut component = accessor.create();
        accessor.load(&mut *self, &mut component, row)?;
        Ok(Some(component))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Write every modified component back to the store.
    pub fn flush(&mut self) -> SessionResult<FlushStats> {
        self.flush_where(|_| true)
    }

    /// As [`flush`](Self::flush), restricted to `components`.
    pub fn flush_only(&mut self, components: &[ComponentId]) -> SessionResult<FlushStats> {
        self.flush_where(|id| components.contains(&id))
    }

    fn flush_where(&mut self, include: impl Fn(ComponentId) -> bool) -> SessionResult<FlushStats> {
        let mut stats = FlushStats::default();
        for (i, column) in self.columns.iter_mut().enumerate() {
            if include(ComponentId(i as u32)) {
                stats += column.flush(&self.rows, &self.deleted)?;
            }
        }
        tracing::trace!(
            store = %self.registry.store().name(),
            entities = self.rows.len(),
            saved = stats.saved,
            skipped = stats.skipped,
            erased = stats.erased,
            "session flushed",
        );
        Ok(stats)
    }

    /// Free rows pending deletion and drop every cached slot.  Returns the
    /// number of rows freed.
    pub fn clear(&mut self) -> usize {
        let store = Arc::clone(self.registry.store());
        let mut freed = 0;
        for (&row, _) in self.rows.iter().zip(&self.deleted).filter(|(_, d)| **d) {
            self.registry.erase(row);
            store.release(row);
            freed += 1;
        }
        if freed > 0 {
            tracing::debug!(store = %store.name(), freed, "deleted rows released");
        }
        self.reset();
        freed
    }

    /// Flush, then clear.
    pub fn close(&mut self) -> SessionResult<FlushStats> {
        let stats = self.flush()?;
        self.clear();
        Ok(stats)
    }

    /// Drop every cached slot without flushing or freeing anything.
    pub fn abandon(&mut self) {
        if !self.rows.is_empty() {
            tracing::debug!(store = %self.registry.store().name(), entities = self.rows.len(), "session abandoned");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.deleted.clear();
        self.index.clear();
        for column in &mut self.columns {
            column.clear();
        }
    }
}

impl EntityResolver for Session {
    fn resolve(&mut self, id: RowId) -> Entity {
        self.get_entity(id)
    }
}

// ── Entity builder ────────────────────────────────────────────────────────────

/// A freshly created entity collecting its initial components.  The row is
/// allocated up front, so dropping the builder early leaves a bare entity.
pub struct EntityBuilder<'s> {
    session: &'s mut Session,
    entity:  Entity,
}

impl EntityBuilder<'_> {
    pub fn with<A: ComponentAccessor>(self, key: ComponentKey<A>, component: A::Component) -> SessionResult<Self> {
        self.session.add(self.entity, key, component)?;
        Ok(self)
    }

    pub fn entity(self) -> Entity {
        self.entity
    }
}
