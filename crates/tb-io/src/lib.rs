//! `tb-io` — bulk CSV transfer for tabula stores.
//!
//! Only the [`Attribute`](tb_store::Attribute) string contract is used, so
//! any column type round-trips, including reference lists.
//!
//! | Module    | Contents                                               |
//! |-----------|--------------------------------------------------------|
//! | [`csv`]   | `export_csv`, `import_csv` and their path variants     |
//! | [`error`] | `IoError`, `IoResult`                                  |

pub mod csv;
pub mod error;

#[cfg(test)]
mod tests;

pub use crate::csv::{ROW_COLUMN, export_csv, export_csv_path, import_csv, import_csv_path};
pub use error::{IoError, IoResult};
