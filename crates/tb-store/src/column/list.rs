//! Variable-width columns: strings and per-row lists.
//!
//! Each row owns a `parking_lot::Mutex` around an optional boxed value.  The
//! list columns never hand out their backing storage; callers push elements
//! into a sink (`load_*`), pull them from a source (`save_*`) or compare
//! in place (`is_equal`) so dirty checks do not materialize a collection.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tb_core::{ABSENT, RowId};

use super::{Attribute, AttributeKind, Cells, join_base36, parse_error, split_base36};
use crate::StoreResult;

// ── StringColumn ──────────────────────────────────────────────────────────────

pub struct StringColumn {
    name:  String,
    cells: Cells<Mutex<Option<Box<str>>>>,
}

impl StringColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), cells: Cells::new(|| Mutex::new(None)) }
    }

    pub fn get(&self, row: RowId) -> Option<String> {
        self.cells
            .read(row, |cell| cell.lock().as_deref().map(str::to_owned))
            .flatten()
    }

    /// Compare without cloning.  An empty cell equals `None`.
    pub fn is_equal(&self, row: RowId, value: Option<&str>) -> bool {
        self.cells
            .read(row, |cell| cell.lock().as_deref() == value)
            .unwrap_or(value.is_none())
    }

    pub fn set(&self, row: RowId, value: Option<&str>) {
        let boxed = value.map(Box::<str>::from);
        self.cells.write(row, |cell| *cell.lock() = boxed);
    }
}

impl Attribute for StringColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::String
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.cells.read(row, |cell| cell.lock().is_none()).unwrap_or(true)
    }

    fn set_empty(&self, row: RowId) {
        self.cells.read(row, |cell| *cell.lock() = None);
    }

    fn ensure_capacity(&self, n: usize) {
        self.cells.ensure(n);
    }

    fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn get_string(&self, row: RowId) -> String {
        self.get(row).unwrap_or_default()
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        if text.is_empty() {
            self.set_empty(row);
        } else {
            self.set(row, Some(text));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ── IntListColumn ─────────────────────────────────────────────────────────────

/// A variable-length `i32` array per row.
pub struct IntListColumn {
    name:  String,
    cells: Cells<Mutex<Option<Box<[i32]>>>>,
}

impl IntListColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), cells: Cells::new(|| Mutex::new(None)) }
    }

    /// Element count; 0 for an empty cell.
    pub fn get_size(&self, row: RowId) -> usize {
        self.cells
            .read(row, |cell| cell.lock().as_ref().map_or(0, |v| v.len()))
            .unwrap_or(0)
    }

    /// Element `index` of `row`, `ABSENT` past the end.
    pub fn get(&self, row: RowId, index: usize) -> i32 {
        self.cells
            .read(row, |cell| {
                cell.lock().as_ref().and_then(|v| v.get(index).copied()).unwrap_or(ABSENT)
            })
            .unwrap_or(ABSENT)
    }

    /// Push every element of `row` into `sink`.  Returns the element count.
    pub fn load_ints(&self, row: RowId, mut sink: impl FnMut(i32)) -> usize {
        self.cells
            .read(row, |cell| match cell.lock().as_ref() {
                Some(values) => {
                    values.iter().for_each(|v| sink(*v));
                    values.len()
                }
                None => 0,
            })
            .unwrap_or(0)
    }

    /// Replace `row` with `size` elements pulled from `source`.
    pub fn save_ints(&self, row: RowId, size: usize, mut source: impl FnMut(usize) -> i32) {
        let values: Box<[i32]> = (0..size).map(&mut source).collect();
        self.cells.write(row, |cell| *cell.lock() = Some(values));
    }

    pub fn set_ints(&self, row: RowId, values: &[i32]) {
        self.save_ints(row, values.len(), |i| values[i]);
    }

    /// `true` if `row` holds exactly the `size` elements `source` yields.
    /// An empty cell equals a zero-length list.
    pub fn is_equal(&self, row: RowId, size: usize, mut source: impl FnMut(usize) -> i32) -> bool {
        self.cells
            .read(row, |cell| match cell.lock().as_ref() {
                Some(values) => {
                    values.len() == size && values.iter().enumerate().all(|(i, v)| *v == source(i))
                }
                None => size == 0,
            })
            .unwrap_or(size == 0)
    }

    /// Mutate the elements of `row` in place without reallocating.  Returns
    /// `None` if the cell is empty.
    pub fn update<R>(&self, row: RowId, f: impl FnOnce(&mut [i32]) -> R) -> Option<R> {
        self.cells
            .read(row, |cell| cell.lock().as_mut().map(|v| f(v)))
            .flatten()
    }
}

impl Attribute for IntListColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::IntList
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.cells.read(row, |cell| cell.lock().is_none()).unwrap_or(true)
    }

    fn set_empty(&self, row: RowId) {
        self.cells.read(row, |cell| *cell.lock() = None);
    }

    fn ensure_capacity(&self, n: usize) {
        self.cells.ensure(n);
    }

    fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn get_string(&self, row: RowId) -> String {
        self.cells
            .read(row, |cell| cell.lock().as_deref().map(join_base36))
            .flatten()
            .unwrap_or_default()
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        if text.trim().is_empty() {
            self.set_empty(row);
            return Ok(());
        }
        let values = split_base36(text).ok_or_else(|| parse_error(&self.name, text))?;
        self.set_ints(row, &values);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ── RefListColumn ─────────────────────────────────────────────────────────────

/// A variable-length list of row references per row.
pub struct RefListColumn(IntListColumn);

impl RefListColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self(IntListColumn::new(name))
    }

    pub fn get_size(&self, row: RowId) -> usize {
        self.0.get_size(row)
    }

    pub fn get(&self, row: RowId, index: usize) -> RowId {
        RowId::from_raw(self.0.get(row, index))
    }

    pub fn load_ids(&self, row: RowId, mut sink: impl FnMut(RowId)) -> usize {
        self.0.load_ints(row, |v| sink(RowId::from_raw(v)))
    }

    pub fn save_ids(&self, row: RowId, size: usize, mut source: impl FnMut(usize) -> RowId) {
        self.0.save_ints(row, size, |i| source(i).0);
    }

    pub fn set_ids(&self, row: RowId, ids: &[RowId]) {
        self.save_ids(row, ids.len(), |i| ids[i]);
    }

    pub fn is_equal(&self, row: RowId, size: usize, mut source: impl FnMut(usize) -> RowId) -> bool {
        self.0.is_equal(row, size, |i| source(i).0)
    }
}

impl Attribute for RefListColumn {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::RefList
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.0.is_empty(row)
    }

    fn set_empty(&self, row: RowId) {
        self.0.set_empty(row);
    }

    fn ensure_capacity(&self, n: usize) {
        self.0.ensure_capacity(n);
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn get_string(&self, row: RowId) -> String {
        self.0.get_string(row)
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        if text.trim().is_empty() {
            self.set_empty(row);
            return Ok(());
        }
        match split_base36(text) {
            Some(values) if values.iter().all(|v| *v >= 0) => {
                self.0.set_ints(row, &values);
                Ok(())
            }
            _ => Err(parse_error(self.name(), text)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
