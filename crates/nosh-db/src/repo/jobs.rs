//! Job store and lease manager backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nosh_core::JobPayload;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, DbResult};

/// A queued background job row.
///
/// `lock_id` is the fencing token: issued fresh at claim time, required to
/// match on completion. At most one non-null lock is live per job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub lock_id: Option<Uuid>,
    pub processor_id: Option<String>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Decode the stored payload into the typed union.
    pub fn decode_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Durable job queue with lease-based mutual exclusion.
///
/// `claim_next` is the only operation that moves a job out of pending, and it
/// is a single conditional update; `complete`/`fail` are fenced by the lock
/// issued at claim time.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Append a pending job.
    async fn enqueue(&self, payload: &JobPayload) -> DbResult<Job>;

    /// Atomically claim the next eligible job for this processor, stamping a
    /// fresh lock. Returns `None` without side effects when nothing is
    /// eligible. A `processing` job whose lease has gone stale is eligible
    /// again; the fresh lock fences out the superseded owner.
    async fn claim_next(&self, processor_id: &str) -> DbResult<Option<Job>>;

    /// Transition processing -> completed, only if `lock_id` still matches.
    async fn complete(&self, job_id: Uuid, lock_id: Uuid) -> DbResult<()>;

    /// Transition processing -> failed, recording the error; fenced like
    /// `complete`.
    async fn fail(&self, job_id: Uuid, lock_id: Uuid, error: &str) -> DbResult<()>;

    /// Cheap probe used by dispatchers to skip claiming when idle. Counts
    /// stale processing rows too, so a stuck job cannot idle the pipeline
    /// forever.
    async fn pending_count(&self) -> DbResult<i64>;

    /// Fetch a job by id (admin/audit surface).
    async fn get(&self, job_id: Uuid) -> DbResult<Option<Job>>;
}

/// Default window after which a processing job's lease is considered stale.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 300;

/// PostgreSQL implementation of [`JobStore`].
pub struct PgJobStore {
    pool: PgPool,
    stale_after: Duration,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            stale_after: Duration::seconds(DEFAULT_STALE_AFTER_SECS),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    fn stale_secs(&self) -> f64 {
        self.stale_after.num_milliseconds() as f64 / 1000.0
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, payload: &JobPayload) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, job_type, payload, status, attempts, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', 0, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(payload.job_type().as_str())
        .bind(serde_json::to_value(payload)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Uses SKIP LOCKED so concurrent dispatchers never contend on the same
    /// row; the claim itself is a single conditional UPDATE.
    async fn claim_next(&self, processor_id: &str) -> DbResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'processing', lock_id = $2, processor_id = $1,
                attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                   OR (status = 'processing' AND updated_at < NOW() - make_interval(secs => $3))
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(processor_id)
        .bind(Uuid::new_v4())
        .bind(self.stale_secs())
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn complete(&self, job_id: Uuid, lock_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', lock_id = NULL, updated_at = NOW()
            WHERE id = $1 AND lock_id = $2 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(lock_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::LeaseLost(job_id));
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, lock_id: Uuid, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', lock_id = NULL, last_error = $3, updated_at = NOW()
            WHERE id = $1 AND lock_id = $2 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(lock_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::LeaseLost(job_id));
        }
        Ok(())
    }

    async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE status = 'pending'
               OR (status = 'processing' AND updated_at < NOW() - make_interval(secs => $1))
            "#,
        )
        .bind(self.stale_secs())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn get(&self, job_id: Uuid) -> DbResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }
}
