//! `tb-store` — typed columns, stores and joins for the `tabula` engine.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                      |
//! |----------------|---------------------------------------------------------------|
//! | [`column`]     | `Attribute`, the typed column families, `ColumnSpec`          |
//! | [`store`]      | `Store`, the `StoreView` trait, nested stores                 |
//! | [`view`]       | `PrefixedStore`, `FilteredStore`                              |
//! | [`join`]       | `Join`, `ArrayJoin`, `RangeJoin`, `SingleJoin`                |
//! | [`listener`]   | `DataListener`, `ListenerId`                                  |
//! | [`error`]      | `StoreError`, `StoreResult`                                   |
//!
//! # Threading
//!
//! Stores and columns are shared as `Arc`s and mutated through `&self`.
//! Concurrent writes to *different* rows of the same column are always
//! safe; concurrent writes to the *same* row are not ordered.  Schema
//! changes (declaring columns, nested stores, joins) take a write lock and
//! are expected to happen during setup.

pub mod column;
pub mod error;
pub mod join;
pub mod listener;
pub mod store;
pub mod view;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use column::{
    Attribute, AttributeKind, BoolColumn, ByteColumn, ColumnSpec, DoubleColumn, EnumColumn,
    FloatColumn, IntColumn, IntListColumn, RefColumn, RefListColumn, Scalar, ScalarColumn,
    ShortColumn, StringColumn, downcast,
};
pub use error::{StoreError, StoreResult};
pub use join::{
    ArrayJoin, Join, JoinKind, MAX_EMBEDDED_LEN, MAX_RANGE_LEN, REVERSE_COLUMN, RangeJoin,
    SingleJoin, SingleMode, Sizing,
};
pub use listener::{DataListener, ListenerId};
pub use store::{SCOPE_SEPARATOR, Store, StoreView};
pub use view::{FilteredStore, PrefixedStore};
