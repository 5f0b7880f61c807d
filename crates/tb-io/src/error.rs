//! Error types for tb-io.

use tb_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("header has no `{0}` column")]
    MissingRowColumn(&'static str),

    #[error("record {record}: invalid row id {text:?}")]
    BadRowId { record: usize, text: String },
}

/// Alias for `Result<T, IoError>`.
pub type IoResult<T> = Result<T, IoError>;
