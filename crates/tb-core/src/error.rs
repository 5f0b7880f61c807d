//! Core error type.
//!
//! Downstream crates define their own enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

/// Errors raised while validating an engine configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `tb-core`.
pub type CoreResult<T> = Result<T, CoreError>;
