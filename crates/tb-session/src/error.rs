use tb_core::RowId;
use tb_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("entity {0} is not cached in this session")]
    NotCached(RowId),

    #[error("entity {0} is pending deletion")]
    Deleted(RowId),

    #[error("component #{0} is not registered")]
    UnknownComponent(usize),

    #[error("component `{0}` registered twice")]
    DuplicateComponent(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
