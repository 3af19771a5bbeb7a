//! Error types for Noshwork.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A data-platform call failed in a way that is worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A fenced write lost to a newer lease holder. Expected under reclaim races.
    #[error("lease lost: {0}")]
    LeaseLost(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
