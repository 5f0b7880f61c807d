//! Fixed-width columns backed by one atomic per row.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI8, AtomicI16, AtomicI32, AtomicU32, AtomicU64, Ordering};

use tb_core::RowId;

use super::{Attribute, AttributeKind, Cells, decode_base36, encode_base36, parse_error};
use crate::StoreResult;

// ── Scalar ────────────────────────────────────────────────────────────────────

/// A primitive value with an atomic cell representation and an empty
/// sentinel.
pub trait Scalar: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    type Cell: Send + Sync + 'static;

    const KIND: AttributeKind;

    /// The empty sentinel.
    const EMPTY: Self;

    fn is_empty_value(self) -> bool;

    fn new_cell(v: Self) -> Self::Cell;

    fn load(cell: &Self::Cell) -> Self;

    fn store(cell: &Self::Cell, v: Self);

    fn format(self) -> String;

    fn parse(text: &str) -> Option<Self>;
}

macro_rules! int_scalar {
    ($t:ty, $atomic:ty, $kind:expr) => {
        impl Scalar for $t {
            type Cell = $atomic;
            const KIND: AttributeKind = $kind;
            const EMPTY: Self = <$t>::MIN;

            #[inline]
            fn is_empty_value(self) -> bool {
                self == <$t>::MIN
            }
            #[inline]
            fn new_cell(v: Self) -> $atomic {
                <$atomic>::new(v)
            }
            #[inline]
            fn load(cell: &$atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }
            #[inline]
            fn store(cell: &$atomic, v: Self) {
                cell.store(v, Ordering::Relaxed)
            }
            fn format(self) -> String {
                self.to_string()
            }
            fn parse(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }
        }
    };
}

int_scalar!(i8,  AtomicI8,  AttributeKind::Byte);
int_scalar!(i16, AtomicI16, AttributeKind::Short);
int_scalar!(i32, AtomicI32, AttributeKind::Int);

macro_rules! float_scalar {
    ($t:ty, $atomic:ty, $kind:expr) => {
        impl Scalar for $t {
            type Cell = $atomic;
            const KIND: AttributeKind = $kind;
            const EMPTY: Self = <$t>::NAN;

            #[inline]
            fn is_empty_value(self) -> bool {
                self.is_nan()
            }
            #[inline]
            fn new_cell(v: Self) -> $atomic {
                <$atomic>::new(v.to_bits())
            }
            #[inline]
            fn load(cell: &$atomic) -> Self {
                <$t>::from_bits(cell.load(Ordering::Relaxed))
            }
            #[inline]
            fn store(cell: &$atomic, v: Self) {
                cell.store(v.to_bits(), Ordering::Relaxed)
            }
            fn format(self) -> String {
                // `Display` for floats is the shortest string that parses back
                // to the same value.
                self.to_string()
            }
            fn parse(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }
        }
    };
}

float_scalar!(f32, AtomicU32, AttributeKind::Float);
float_scalar!(f64, AtomicU64, AttributeKind::Double);

// ── ScalarColumn ──────────────────────────────────────────────────────────────

/// One `T` per row.
pub struct ScalarColumn<T: Scalar> {
    name:  String,
    cells: Cells<T::Cell>,
}

pub type ByteColumn   = ScalarColumn<i8>;
pub type ShortColumn  = ScalarColumn<i16>;
pub type IntColumn    = ScalarColumn<i32>;
pub type FloatColumn  = ScalarColumn<f32>;
pub type DoubleColumn = ScalarColumn<f64>;

impl<T: Scalar> ScalarColumn<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:  name.into(),
            cells: Cells::new(|| T::new_cell(T::EMPTY)),
        }
    }

    /// Raw cell value, the sentinel if empty.
    #[inline]
    pub fn get(&self, row: RowId) -> T {
        self.cells.read(row, T::load).unwrap_or(T::EMPTY)
    }

    /// `None` if the cell is empty.
    #[inline]
    pub fn value(&self, row: RowId) -> Option<T> {
        let v = self.get(row);
        (!v.is_empty_value()).then_some(v)
    }

    #[inline]
    pub fn set(&self, row: RowId, v: T) {
        self.cells.write(row, |cell| T::store(cell, v));
    }
}

impl<T: Scalar> Attribute for ScalarColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AttributeKind {
        T::KIND
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.get(row).is_empty_value()
    }

    fn set_empty(&self, row: RowId) {
        // Past-the-end rows are already empty.
        self.cells.read(row, |cell| T::store(cell, T::EMPTY));
    }

    fn ensure_capacity(&self, n: usize) {
        self.cells.ensure(n);
    }

    fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn get_string(&self, row: RowId) -> String {
        self.value(row).map(T::format).unwrap_or_default()
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        if text.trim().is_empty() {
            self.set_empty(row);
            return Ok(());
        }
        let v = T::parse(text).ok_or_else(|| parse_error(&self.name, text))?;
        self.set(row, v);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ── BoolColumn ────────────────────────────────────────────────────────────────

/// Tri-state boolean: `Some(true)`, `Some(false)` or empty.
pub struct BoolColumn(ByteColumn);

impl BoolColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self(ByteColumn::new(name))
    }

    #[inline]
    pub fn get(&self, row: RowId) -> Option<bool> {
        self.0.value(row).map(|b| b != 0)
    }

    #[inline]
    pub fn set(&self, row: RowId, v: bool) {
        self.0.set(row, v as i8);
    }
}

impl Attribute for BoolColumn {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::Bool
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
        self.get(row).map(|b| b.to_string()).unwrap_or_default()
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        match text.trim() {
            ""             => self.set_empty(row),
            "true" | "1"   => self.set(row, true),
            "false" | "0"  => self.set(row, false),
            _              => return Err(parse_error(self.name(), text)),
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

// ── EnumColumn ────────────────────────────────────────────────────────────────

/// Enum ordinal per row, with a fixed table of variant names.
pub struct EnumColumn {
    raw:      ShortColumn,
    variants: Vec<String>,
}

impl EnumColumn {
    pub fn new(name: impl Into<String>, variants: Vec<String>) -> Self {
        Self { raw: ShortColumn::new(name), variants }
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    #[inline]
    pub fn get(&self, row: RowId) -> Option<u16> {
        self.raw.value(row).map(|v| v as u16)
    }

    #[inline]
    pub fn set(&self, row: RowId, ordinal: u16) {
        debug_assert!((ordinal as usize) < self.variants.len(), "ordinal out of range");
        self.raw.set(row, ordinal as i16);
    }

    pub fn get_name(&self, row: RowId) -> Option<&str> {
        self.get(row)
            .and_then(|o| self.variants.get(o as usize))
            .map(String::as_str)
    }

    pub fn ordinal_of(&self, name: &str) -> Option<u16> {
        self.variants.iter().position(|v| v == name).map(|p| p as u16)
    }
}

impl Attribute for EnumColumn {
    fn name(&self) -> &str {
        self.raw.name()
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::Enum
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.raw.is_empty(row)
    }

    fn set_empty(&self, row: RowId) {
        self.raw.set_empty(row);
    }

    fn ensure_capacity(&self, n: usize) {
        self.raw.ensure_capacity(n);
    }

    fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    fn get_string(&self, row: RowId) -> String {
        self.get_name(row).map(str::to_owned).unwrap_or_default()
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        let text = text.trim();
        if text.is_empty() {
            self.set_empty(row);
            return Ok(());
        }
        let ordinal = self.ordinal_of(text).ok_or_else(|| parse_error(self.name(), text))?;
        self.set(row, ordinal);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ── RefColumn ─────────────────────────────────────────────────────────────────

/// A reference to one row (usually in another store).
pub struct RefColumn(IntColumn);

impl RefColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self(IntColumn::new(name))
    }

    #[inline]
    pub fn get(&self, row: RowId) -> RowId {
        RowId::from_raw(self.0.get(row))
    }

    #[inline]
    pub fn set(&self, row: RowId, target: RowId) {
        self.0.set(row, target.0);
    }
}

impl Attribute for RefColumn {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn kind(&self) -> AttributeKind {
        AttributeKind::Ref
    }

    fn is_empty(&self, row: RowId) -> bool {
        self.get(row).is_absent()
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
        let target = self.get(row);
        if target.is_absent() { String::new() } else { encode_base36(target.0) }
    }

    fn set_string(&self, row: RowId, text: &str) -> StoreResult<()> {
        if text.trim().is_empty() {
            self.set_empty(row);
            return Ok(());
        }
        match decode_base36(text) {
            Some(v) if v >= 0 => {
                self.set(row, RowId(v));
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
