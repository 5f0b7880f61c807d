use tb_core::{ChunkId, CoreError, RowId};
use tb_session::SessionError;
use tb_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IterError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("row {row} processed by both {first} and {second}")]
    OwnershipConflict { row: RowId, first: ChunkId, second: ChunkId },

    /// Raised by user actions.
    #[error("{0}")]
    Action(String),
}

pub type IterResult<T> = Result<T, IterError>;
