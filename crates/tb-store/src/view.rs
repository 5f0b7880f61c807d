//! Zero-copy wrappers over a [`Store`].
//!
//! - [`PrefixedStore`] namespaces every column name, so one component type
//!   can be embedded inside another's store under a distinct prefix.
//! - [`FilteredStore`] exposes only the columns a predicate selects while
//!   sharing the underlying row count and allocator.

use std::sync::Arc;

use tb_core::Counter;

use crate::column::{Attribute, ColumnSpec};
use crate::{Join, Store, StoreError, StoreResult, StoreView};

// ── PrefixedStore ─────────────────────────────────────────────────────────────

pub struct PrefixedStore {
    inner:  Arc<Store>,
    prefix: String,
}

impl PrefixedStore {
    pub fn new(inner: Arc<Store>, prefix: impl Into<String>) -> Self {
        Self { inner, prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn inner(&self) -> &Arc<Store> {
        &self.inner
    }

    fn full(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl StoreView for PrefixedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Attribute>> {
        self.inner.get(&self.full(name))
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.inner
            .attributes()
            .into_iter()
            .filter(|a| a.name().starts_with(&self.prefix))
            .collect()
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn counter(&self) -> &Arc<Counter> {
        self.inner.counter()
    }

    fn declare(&self, name: &str, spec: &ColumnSpec) -> StoreResult<Arc<dyn Attribute>> {
        self.inner.declare(&self.full(name), spec)
    }

    fn register_join(&self, name: &str, join: Arc<dyn Join>) {
        self.inner.register_join(&self.full(name), join);
    }

    fn join(&self, name: &str) -> Option<Arc<dyn Join>> {
        self.inner.join(&self.full(name))
    }
}

// ── FilteredStore ─────────────────────────────────────────────────────────────

type ColumnFilter = dyn Fn(&dyn Attribute) -> bool + Send + Sync;

/// Read-only subset view: declaring columns through it is an error.
pub struct FilteredStore {
    inner:     Arc<dyn StoreView>,
    predicate: Box<ColumnFilter>,
}

impl FilteredStore {
    pub fn new<F>(inner: Arc<dyn StoreView>, predicate: F) -> Self
    where
        F: Fn(&dyn Attribute) -> bool + Send + Sync + 'static,
    {
        Self { inner, predicate: Box::new(predicate) }
    }
}

impl StoreView for FilteredStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Attribute>> {
        self.inner.get(name).filter(|a| (self.predicate)(a.as_ref()))
    }

    fn attributes(&self) -> Vec<Arc<dyn Attribute>> {
        self.inner
            .attributes()
            .into_iter()
            .filter(|a| (self.predicate)(a.as_ref()))
            .collect()
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn counter(&self) -> &Arc<Counter> {
        self.inner.counter()
    }

    fn declare(&self, _name: &str, _spec: &ColumnSpec) -> StoreResult<Arc<dyn Attribute>> {
        Err(StoreError::ReadOnlyView(self.inner.name().to_owned()))
    }

    /// Ignored: the view never mutates the underlying store.
    fn register_join(&self, name: &str, _join: Arc<dyn Join>) {
        tracing::trace!(store = %self.inner.name(), join = name, "join registration ignored by filtered view");
    }

    fn join(&self, name: &str) -> Option<Arc<dyn Join>> {
        self.inner.join(name)
    }
}
