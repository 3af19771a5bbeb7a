//! Database error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A fenced job write did not match the stored lock. Raised when a worker
    /// that lost its lease tries to complete or fail the job.
    #[error("lease lost for job {0}")]
    LeaseLost(Uuid),

    #[error("payload encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for nosh_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => nosh_core::Error::NotFound(msg),
            DbError::LeaseLost(job_id) => nosh_core::Error::LeaseLost(job_id.to_string()),
            DbError::Encode(e) => nosh_core::Error::Validation(e.to_string()),
            other => nosh_core::Error::Transient(other.to_string()),
        }
    }
}
