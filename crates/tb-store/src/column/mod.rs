//! Typed, nullable, growable attribute columns.
//!
//! # Design
//!
//! Every column is one array indexed by `RowId`, shared behind an `Arc` and
//! written through `&self`:
//!
//! - scalar columns hold one atomic per row (relaxed loads and stores),
//! - heap columns (strings, lists) hold one `parking_lot::Mutex` per row.
//!
//! During an iteration pass each row is owned by exactly one chunk, so cell
//! access never contends.  Growth replaces the backing `Vec` and therefore
//! takes the column's `RwLock` for writing; all other access takes it for
//! reading.  Growth is by at least 1.5× and never shrinks.
//!
//! Each type has an empty sentinel: `NaN` for floats, the minimum value for
//! integers, `None` for strings and lists.  Reads past the end of the
//! backing array return the sentinel, so [`Attribute::is_empty`] is safe on
//! any row.
//!
//! # String contract
//!
//! [`Attribute::get_string`] / [`Attribute::set_string`] are the
//! format-agnostic transfer surface.  Numbers use their canonical decimal
//! form, enums their variant name, references and lists comma-joined base-36
//! ids.  The empty string is the empty sentinel in both directions.

mod list;
mod scalar;

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use tb_core::{RowId, encode_base36};

use crate::{StoreError, StoreResult};

pub use list::{IntListColumn, RefListColumn, StringColumn};
pub use scalar::{
    BoolColumn, ByteColumn, DoubleColumn, EnumColumn, FloatColumn, IntColumn, RefColumn, Scalar,
    ScalarColumn, ShortColumn,
};

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// The value type of a column.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AttributeKind {
    Bool,
    Byte,
    Short,
    Int,
    Float,
    Double,
    String,
    Enum,
    IntList,
    Ref,
    RefList,
}

/// What to build when a column is declared.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ColumnSpec {
    Bool,
    Byte,
    Short,
    Int,
    Float,
    Double,
    String,
    /// Enum with a fixed variant table; cells store the ordinal.
    Enum(Vec<String>),
    IntList,
    Ref,
    RefList,
}

impl ColumnSpec {
    pub fn kind(&self) -> AttributeKind {
        match self {
            ColumnSpec::Bool    => AttributeKind::Bool,
            ColumnSpec::Byte    => AttributeKind::Byte,
            ColumnSpec::Short   => AttributeKind::Short,
            ColumnSpec::Int     => AttributeKind::Int,
            ColumnSpec::Float   => AttributeKind::Float,
            ColumnSpec::Double  => AttributeKind::Double,
            ColumnSpec::String  => AttributeKind::String,
            ColumnSpec::Enum(_) => AttributeKind::Enum,
            ColumnSpec::IntList => AttributeKind::IntList,
            ColumnSpec::Ref     => AttributeKind::Ref,
            ColumnSpec::RefList => AttributeKind::RefList,
        }
    }

    /// Construct an empty column named `name`.
    pub fn build(&self, name: &str) -> Arc<dyn Attribute> {
        match self {
            ColumnSpec::Bool       => Arc::new(BoolColumn::new(name)),
            ColumnSpec::Byte       => Arc::new(ByteColumn::new(name)),
            ColumnSpec::Short      => Arc::new(ShortColumn::new(name)),
            ColumnSpec::Int        => Arc::new(IntColumn::new(name)),
            ColumnSpec::Float      => Arc::new(FloatColumn::new(name)),
            ColumnSpec::Double     => Arc::new(DoubleColumn::new(name)),
            ColumnSpec::String     => Arc::new(StringColumn::new(name)),
            ColumnSpec::Enum(vars) => Arc::new(EnumColumn::new(name, vars.clone())),
            ColumnSpec::IntList    => Arc::new(IntListColumn::new(name)),
            ColumnSpec::Ref        => Arc::new(RefColumn::new(name)),
            ColumnSpec::RefList    => Arc::new(RefListColumn::new(name)),
        }
    }
}

// ── Attribute ─────────────────────────────────────────────────────────────────

/// Type-erased interface shared by every column.
pub trait Attribute: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> AttributeKind;

    /// `true` if `row` holds the empty sentinel (or lies past the end).
    fn is_empty(&self, row: RowId) -> bool;

    fn set_empty(&self, row: RowId);

    /// Grow to at least `n` rows, filling new cells with the sentinel.
    fn ensure_capacity(&self, n: usize);

    /// Rows currently backed by storage.
    fn capacity(&self) -> usize;

    /// Canonical string form; empty string for an empty cell.
    fn get_string(&self, row: RowId) -> String;

    /// Parse `text` into `row`; the empty string empties the cell.
    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()>;

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Recover the concrete column type behind a shared attribute.
pub fn downcast<C: Attribute>(attr: Arc<dyn Attribute>) -> Option<Arc<C>> {
    attr.into_any().downcast::<C>().ok()
}

pub(crate) fn parse_error(column: &str, text: &str) -> StoreError {
    StoreError::Parse { column: column.to_owned(), text: text.to_owned() }
}

// ── Cells ─────────────────────────────────────────────────────────────────────

/// Growable backing array shared by all column types.
pub(crate) struct Cells<C> {
    inner: RwLock<Vec<C>>,
    make:  fn() -> C,
}

impl<C> Cells<C> {
    pub(crate) fn new(make: fn() -> C) -> Self {
        Self { inner: RwLock::new(Vec::new()), make }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub(crate) fn ensure(&self, n: usize) {
        if self.inner.read().len() >= n {
            return;
        }
        let mut cells = self.inner.write();
        let len = cells.len();
        if len >= n {
            return;
        }
        let target = n.max(len + len / 2);
        cells.resize_with(target, self.make);
    }

    /// Run `f` on the cell for `row`, or return `None` past the end.
    #[inline]
    pub(crate) fn read<R>(&self, row: RowId, f: impl FnOnce(&C) -> R) -> Option<R> {
        if row.is_absent() {
            return None;
        }
        let cells = self.inner.read();
        cells.get(row.index()).map(f)
    }

    /// Run `f` on the cell for `row`, growing first if needed.  Writes to the
    /// absent row are ignored.
    #[inline]
    pub(crate) fn write<R>(&self, row: RowId, f: impl FnOnce(&C) -> R) -> Option<R> {
        if row.is_absent() {
            debug_assert!(false, "write to absent row");
            return None;
        }
        let idx = row.index();
        {
            let cells = self.inner.read();
            if let Some(cell) = cells.get(idx) {
                return Some(f(cell));
            }
        }
        self.ensure(idx + 1);
        let cells = self.inner.read();
        cells.get(idx).map(f)
    }
}

// ── Base-36 list encoding ─────────────────────────────────────────────────────

pub(crate) fn decode_base36(text: &str) -> Option<i32> {
    i32::from_str_radix(text.trim(), 36).ok()
}

pub(crate) fn join_base36(values: &[i32]) -> String {
    values.iter().map(|v| encode_base36(*v)).collect::<Vec<_>>().join(",")
}

pub(crate) fn split_base36(text: &str) -> Option<Vec<i32>> {
    text.split(',').map(decode_base36).collect()
}
