//! CSV bridge.
//!
//! Layout: a header of `_row` followed by every column name in declaration
//! order, then one record per non-empty row.  `_row` holds the base-36 row
//! id; every other field is the column's `get_string` form, empty for an
//! empty cell.
//!
//! ```text
//! _row,age,name,friends
//! 0,34,Ada,"1,2"
//! 2,51,,
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, Writer};
use tb_core::RowId;
use tb_store::{Attribute, ListenerId, Store, StoreError, StoreView};

use crate::{IoError, IoResult};

/// Name of the row-id column.
pub const ROW_COLUMN: &str = "_row";

/// Write every present row of `store`.  Returns the number of records.
pub fn export_csv<W: Write>(store: &dyn StoreView, writer: W) -> IoResult<usize> {
    let columns = store.attributes();
    let mut out = Writer::from_writer(writer);
    out.write_record(std::iter::once(ROW_COLUMN).chain(columns.iter().map(|c| c.name())))?;

    let mut written = 0;
    for row in (0..store.count() as i32).map(RowId) {
        if columns.iter().all(|c| c.is_empty(row)) {
            continue;
        }
        out.write_record(
            std::iter::once(row.to_base36()).chain(columns.iter().map(|c| c.get_string(row))),
        )?;
        written += 1;
    }
    out.flush()?;
    tracing::debug!(store = %store.name(), rows = written, columns = columns.len(), "exported csv");
    Ok(written)
}

/// Load records into `store` by row id, growing it as needed, then fire one
/// `data_changed` over the touched range to every listener not in
/// `exclude`.  Returns the number of records.
///
/// Every header other than `_row` must name an existing column.
pub fn import_csv<R: Read>(store: &Store, reader: R, exclude: &[ListenerId]) -> IoResult<usize> {
    let mut input = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = input.headers()?.clone();
    let row_field = headers
        .iter()
        .position(|h| h == ROW_COLUMN)
        .ok_or(IoError::MissingRowColumn(ROW_COLUMN))?;

    let mut columns: Vec<Option<Arc<dyn Attribute>>> = Vec::with_capacity(headers.len());
    for (i, name) in headers.iter().enumerate() {
        if i == row_field {
            columns.push(None);
        } else {
            let column = store.get(name).ok_or_else(|| StoreError::UnknownColumn(name.to_owned()))?;
            columns.push(Some(column));
        }
    }

    let (mut from, mut to, mut read) = (usize::MAX, 0, 0);
    for (i, record) in input.records().enumerate() {
        let record = record?;
        let text = record.get(row_field).unwrap_or_default();
        let row = RowId::parse_base36(text)
            .filter(|r| !r.is_absent())
            .ok_or_else(|| IoError::BadRowId { record: i + 1, text: text.to_owned() })?;

        let end = row.index() + 1;
        store.counter().ensure_count(end);
        store.ensure_capacity(end);
        for (field, column) in record.iter().zip(&columns) {
            if let Some(column) = column {
                column.set_string(row, field)?;
            }
        }
        from = from.min(row.index());
        to = to.max(end);
        read += 1;
    }

    if read > 0 {
        store.fire_data_changed(from, to, exclude);
    }
    tracing::debug!(store = %store.name(), rows = read, "imported csv");
    Ok(read)
}

/// [`export_csv`] into a new file at `path`.
pub fn export_csv_path(store: &dyn StoreView, path: &Path) -> IoResult<usize> {
    export_csv(store, File::create(path)?)
}

/// [`import_csv`] from the file at `path`.
pub fn import_csv_path(store: &Store, path: &Path, exclude: &[ListenerId]) -> IoResult<usize> {
    import_csv(store, File::open(path)?, exclude)
}
