//! `Store` — a named set of columns sharing one row allocator.
//!
//! # Layout
//!
//! ```text
//! Store "person"
//! ├── columns (insertion order): age: Int, name: String, friends: RefList, …
//! ├── nested stores:            "address" → Store (own Counter)
//! ├── joins by name:            "address" → RangeJoin(person → address)
//! └── listeners:                cooperative data-changed callbacks
//! ```
//!
//! Every column is addressed by the same `RowId`s, handed out by the store's
//! [`Counter`].  The high-water mark of that counter is the store's `count`;
//! [`Store::allocate`] grows every column to cover it before returning.
//!
//! Names containing `/` are scoped: `"address/street"` resolves the column
//! `street` inside the nested store `address`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tb_core::{Counter, EngineConfig, RowId};

use crate::column::{
    Attribute, AttributeKind, BoolColumn, ByteColumn, ColumnSpec, DoubleColumn, EnumColumn,
    FloatColumn, IntColumn, IntListColumn, RefColumn, RefListColumn, ShortColumn, StringColumn,
    downcast,
};
use crate::{DataListener, Join, ListenerId, StoreError, StoreResult};

/// Separator between a nested store name and a column name.
pub const SCOPE_SEPARATOR: char = '/';

// ── StoreView ─────────────────────────────────────────────────────────────────

/// The column-declaration and lookup interface shared by [`Store`] and its
/// zero-copy wrappers ([`PrefixedStore`][crate::PrefixedStore],
/// [`FilteredStore`][crate::FilteredStore]).
pub trait StoreView: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a column (or a scoped `store/column`).
    fn get(&self, name: &str) -> Option<Arc<dyn Attribute>>;

    /// All visible columns, in declaration order.
    fn attributes(&self) -> Vec<Arc<dyn Attribute>>;

    /// Exclusive upper bound of valid rows.
    fn count(&self) -> usize;

    /// The allocator shared by every column of the underlying store.
    fn counter(&self) -> &Arc<Counter>;

    /// Declare a column.  Re-declaring an existing name with the same kind
    /// returns the existing column.
    fn declare(&self, name: &str, spec: &ColumnSpec) -> StoreResult<Arc<dyn Attribute>>;

    fn register_join(&self, name: &str, join: Arc<dyn Join>);

    fn join(&self, name: &str) -> Option<Arc<dyn Join>>;

    fn add_bool(&self, name: &str) -> StoreResult<Arc<BoolColumn>> {
        typed(self.declare(name, &ColumnSpec::Bool)?, name, AttributeKind::Bool)
    }

    fn add_byte(&self, name: &str) -> StoreResult<Arc<ByteColumn>> {
        typed(self.declare(name, &ColumnSpec::Byte)?, name, AttributeKind::Byte)
    }

    fn add_short(&self, name: &str) -> StoreResult<Arc<ShortColumn>> {
        typed(self.declare(name, &ColumnSpec::Short)?, name, AttributeKind::Short)
    }

    fn add_int(&self, name: &str) -> StoreResult<Arc<IntColumn>> {
        typed(self.declare(name, &ColumnSpec::Int)?, name, AttributeKind::Int)
    }

    fn add_float(&self, name: &str) -> StoreResult<Arc<FloatColumn>> {
        typed(self.declare(name, &ColumnSpec::Float)?, name, AttributeKind::Float)
    }

    fn add_double(&self, name: &str) -> StoreResult<Arc<DoubleColumn>> {
        typed(self.declare(name, &ColumnSpec::Double)?, name, AttributeKind::Double)
    }

    fn add_string(&self, name: &str) -> StoreResult<Arc<StringColumn>> {
        typed(self.declare(name, &ColumnSpec::String)?, name, AttributeKind::String)
    }

    fn add_enum(&self, name: &str, variants: &[&str]) -> StoreResult<Arc<EnumColumn>> {
        let spec = ColumnSpec::Enum(variants.iter().map(|v| (*v).to_owned()).collect());
        typed(self.declare(name, &spec)?, name, AttributeKind::Enum)
    }

    fn add_int_list(&self, name: &str) -> StoreResult<Arc<IntListColumn>> {
        typed(self.declare(name, &ColumnSpec::IntList)?, name, AttributeKind::IntList)
    }

    fn add_ref(&self, name: &str) -> StoreResult<Arc<RefColumn>> {
        typed(self.declare(name, &ColumnSpec::Ref)?, name, AttributeKind::Ref)
    }

    fn add_ref_list(&self, name: &str) -> StoreResult<Arc<RefListColumn>> {
        typed(self.declare(name, &ColumnSpec::RefList)?, name, AttributeKind::RefList)
    }
}

pub(crate) fn typed<C: Attribute>(
    attr:      Arc<dyn Attribute>,
    name:      &str,
    requested: AttributeKind,
) -> StoreResult<Arc<C>> {
    let existing = attr.kind();
    downcast::<C>(attr).ok_or_else(|| StoreError::KindMismatch {
        name: name.to_owned(),
        existing,
        requested,
    })
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Schema {
    columns:  Vec<Arc<dyn Attribute>>,
    by_name:  FxHashMap<String, usize>,
    children: Vec<(String, Arc<Store>)>,
    joins:    FxHashMap<String, Arc<dyn Join>>,
}

pub struct Store {
    name:          String,
    counter:       Arc<Counter>,
    schema:        RwLock<Schema>,
    listeners:     RwLock<Vec<(ListenerId, Arc<dyn DataListener>)>>,
    next_listener: AtomicU32,
}

impl Store {
    /// An empty store whose free ring holds `free_list_capacity` ids.
    pub fn new(name: impl Into<String>, free_list_capacity: usize) -> Self {
        Self::with_counter(name, Arc::new(Counter::new(free_list_capacity)))
    }

    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        Self::new(name, config.free_list_capacity)
    }

    /// An empty store drawing rows from an existing allocator.
    pub fn with_counter(name: impl Into<String>, counter: Arc<Counter>) -> Self {
        Self {
            name: name.into(),
            counter,
            schema: RwLock::new(Schema::default()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU32::new(0),
        }
    }

    // ── Rows ──────────────────────────────────────────────────────────────

    /// Allocate one row (recycled if possible) and make sure every column
    /// covers it.
    pub fn allocate(&self) -> RowId {
        let row = self.counter.next();
        self.ensure_capacity(self.counter.count());
        row
    }

    /// Allocate `n` contiguous fresh rows and return the first.
    pub fn allocate_block(&self, n: usize) -> RowId {
        let first = self.counter.next_block(n);
        self.ensure_capacity(self.counter.count());
        first
    }

    /// Erase `row` in every column and hand it back to the allocator.
    pub fn release(&self, row: RowId) {
        self.erase_row(row);
        self.counter.free(row);
    }

    /// Grow every column to at least `n` rows.
    pub fn ensure_capacity(&self, n: usize) {
        let schema = self.schema.read();
        for col in &schema.columns {
            col.ensure_capacity(n);
        }
    }

    /// Empty `row` in every column of this store.
    pub fn erase_row(&self, row: RowId) {
        let schema = self.schema.read();
        for col in &schema.columns {
            col.set_empty(row);
        }
    }

    /// `true` if any column of `row` is non-empty.
    pub fn is_row_present(&self, row: RowId) -> bool {
        let schema = self.schema.read();
        schema.columns.iter().any(|col| !col.is_empty(row))
    }

    /// All row ids below the high-water mark.
    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + use<> {
        (0..self.count() as i32).map(RowId)
    }

    // ── Nested stores ─────────────────────────────────────────────────────

    /// Declare a nested store with its own allocator.  Idempotent.
    pub fn add_store(&self, name: &str, free_list_capacity: usize) -> Arc<Store> {
        let mut schema = self.schema.write();
        if let Some((_, child)) = schema.children.iter().find(|(n, _)| n == name) {
            return Arc::clone(child);
        }
        let child = Arc::new(Store::new(name, free_list_capacity));
        schema.children.push((name.to_owned(), Arc::clone(&child)));
        child
    }

    pub fn store(&self, name: &str) -> Option<Arc<Store>> {
        let schema = self.schema.read();
        schema
            .children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, child)| Arc::clone(child))
    }

    pub fn stores(&self) -> Vec<Arc<Store>> {
        self.schema.read().children.iter().map(|(_, c)| Arc::clone(c)).collect()
    }

    pub fn joins(&self) -> Vec<Arc<dyn Join>> {
        self.schema.read().joins.values().cloned().collect()
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn DataListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Tell every registered listener, except those in `excluded`, that rows
    /// `[from, to)` changed.  Listeners run synchronously in registration
    /// order; none are fired automatically by any store mutation.
    pub fn fire_data_changed(&self, from: usize, to: usize, excluded: &[ListenerId]) {
        // Snapshot so listeners may (un)register without deadlocking.
        let targets: Vec<Arc<dyn DataListener>> = self
            .listeners
            .read()
            .iter()
            .filter(|(id, _)| !excluded.contains(id))
            .map(|(_, l)| Arc::clone(l))
            .collect();
        tracing::debug!(store = %self.name, from, to, listeners = targets.len(), "data changed");
        for listener in targets {
            listener.data_changed(self, from, to);
        }
    }
}

impl StoreView for Store {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Attribute>> {
        if let Some((scope, rest)) = name.split_once(SCOPE_SEPARATOR) {
            return self.store(scope)?.get(rest);
        }
        let schema = self.schema.read();
        schema.by_name.get(name).map(|&i| Arc::clone(&schema.columns[i]))
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.schema.read().columns.clone()
    }

    fn count(&self) -> usize {
        self.counter.count()
    }

    fn counter(&self) -> &Arc<Counter> {
        &self.counter
    }

    fn declare(&self, name: &str, spec: &ColumnSpec) -> StoreResult<Arc<dyn Attribute>> {
        if let Some((scope, rest)) = name.split_once(SCOPE_SEPARATOR) {
            let child = self
                .store(scope)
                .ok_or_else(|| StoreError::UnknownStore(scope.to_owned()))?;
            return child.declare(rest, spec);
        }

        let mut schema = self.schema.write();
        if let Some(&i) = schema.by_name.get(name) {
            let existing = &schema.columns[i];
            if existing.kind() != spec.kind() {
                return Err(StoreError::KindMismatch {
                    name:      name.to_owned(),
                    existing:  existing.kind(),
                    requested: spec.kind(),
                });
            }
            return Ok(Arc::clone(existing));
        }

        let column = spec.build(name);
        column.ensure_capacity(self.counter.count());
        let index = schema.columns.len();
        schema.columns.push(Arc::clone(&column));
        schema.by_name.insert(name.to_owned(), index);
        tracing::trace!(store = %self.name, column = name, kind = ?spec.kind(), "declared column");
        Ok(column)
    }

    fn register_join(&self, name: &str, join: Arc<dyn Join>) {
        self.schema.write().joins.insert(name.to_owned(), join);
    }

    fn join(&self, name: &str) -> Option<Arc<dyn Join>> {
        self.schema.read().joins.get(name).cloned()
    }
}
