//! The contract a component type implements to live in a [`Store`].
//!
//! An accessor owns the mapping between one in-memory component value and
//! its columns (and joins).  It is usually generated; the session only ever
//! calls the methods below.

use tb_core::RowId;
use tb_store::{Store, StoreResult};

use crate::EntityResolver;

pub trait ComponentAccessor: Send + Sync + 'static {
    /// The in-memory value cached by a session.
    type Component: Send + 'static;

    /// Unique name within one registry.
    fn name(&self) -> &str;

    /// Declare the columns and joins this component needs.  Must be
    /// idempotent.
    fn configure_store(&self, store: &Store) -> StoreResult<()>;

    /// Bind to the live columns declared by [`configure_store`](Self::configure_store).
    fn attach_store(&mut self, store: &Store) -> StoreResult<()>;

    /// A fresh, default-valued component.
    fn create(&self) -> Self::Component;

    /// Fill `component` from `row`.  References to other rows of the same
    /// store are turned into handles through `resolver`.
    fn load(
        &self,
        resolver:  &mut dyn EntityResolver,
        component: &mut Self::Component,
        row:       RowId,
    ) -> StoreResult<()>;

    /// Write `component` into `row`.
    fn save(&self, component: &Self::Component, row: RowId) -> StoreResult<()>;

    /// `true` if `row` stores this component.  Safe on any row.
    fn is_present(&self, row: RowId) -> bool;

    /// `true` if `component` differs from what `row` stores.
    fn is_modified(&self, component: &Self::Component, row: RowId) -> bool;

    /// Remove this component from `row`, releasing any child rows.
    fn erase(&self, row: RowId);

    /// Grow every bound column to at least `n` rows.
    fn ensure_capacity(&self, n: usize);
}
