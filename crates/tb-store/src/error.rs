use thiserror::Error;

use crate::AttributeKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("column `{name}` already declared as {existing:?}, requested {requested:?}")]
    KindMismatch {
        name:      String,
        existing:  AttributeKind,
        requested: AttributeKind,
    },

    #[error("no nested store named `{0}`")]
    UnknownStore(String),

    #[error("no column named `{0}`")]
    UnknownColumn(String),

    #[error("column `{column}` cannot parse {text:?}")]
    Parse { column: String, text: String },

    #[error("view `{0}` does not allow declaring columns")]
    ReadOnlyView(String),

    #[error("contract violation: {0}")]
    Contract(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
