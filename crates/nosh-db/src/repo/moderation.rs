//! Moderation collaborators: content, creators, and runtime configuration.
//!
//! The state-changing operations are conditional single-row UPDATEs that
//! report whether the transition actually happened. That return value is the
//! idempotency signal the handlers use to suppress duplicate notifications on
//! retried jobs.

use async_trait::async_trait;
use nosh_core::job::ContentType;
use nosh_core::moderation::ModerationConfig;
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// Fresh read of the process-wide moderation settings. Never cached.
#[async_trait]
pub trait ModerationConfigSource: Send + Sync {
    async fn load(&self) -> DbResult<ModerationConfig>;
}

/// Moderation and publishing transitions on content.
///
/// Transitions are one-way: flagged content is not republished here, and
/// nothing in this subsystem reverses a moderation decision.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Move content into the flagged state with a moderation note. Returns
    /// `false` when the content was already flagged (retry no-op). Missing
    /// content is `DbError::NotFound` (fatal to the job).
    async fn flag(&self, content_id: &str, content_type: ContentType, note: &str)
    -> DbResult<bool>;

    /// Move scheduled content to published. Returns `false` when the content
    /// is already published (or flagged, which publish must not undo).
    async fn publish(&self, content_id: &str, content_type: ContentType) -> DbResult<bool>;
}

/// Moderation transitions on creators.
#[async_trait]
pub trait CreatorRepo: Send + Sync {
    /// Count of this creator's resolved (confirmed) violations.
    async fn resolved_violation_count(&self, chef_id: &str) -> DbResult<i64>;

    /// Returns `false` when the creator was already suspended.
    async fn suspend(&self, chef_id: &str, note: &str) -> DbResult<bool>;

    /// Returns `false` when the creator was already flagged or suspended.
    async fn flag(&self, chef_id: &str, note: &str) -> DbResult<bool>;
}

/// PostgreSQL implementation of [`ModerationConfigSource`].
pub struct PgModerationConfigSource {
    pool: PgPool,
}

impl PgModerationConfigSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    prohibited_keywords: Vec<String>,
    violation_threshold: i32,
    auto_suspend_enabled: bool,
}

#[async_trait]
impl ModerationConfigSource for PgModerationConfigSource {
    async fn load(&self) -> DbResult<ModerationConfig> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT prohibited_keywords, violation_threshold, auto_suspend_enabled
            FROM moderation_settings
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(row) => ModerationConfig {
                prohibited_keywords: row.prohibited_keywords,
                violation_threshold: row.violation_threshold.max(0) as u32,
                auto_suspend_enabled: row.auto_suspend_enabled,
            },
            None => ModerationConfig::default(),
        })
    }
}

/// PostgreSQL implementation of [`ContentRepo`].
pub struct PgContentRepo {
    pool: PgPool,
}

impl PgContentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn table(content_type: ContentType) -> &'static str {
        match content_type {
            ContentType::Video => "video_posts",
            ContentType::Post => "posts",
        }
    }

    async fn exists(&self, table: &str, content_id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar(&format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)"))
                .bind(content_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ContentRepo for PgContentRepo {
    async fn flag(
        &self,
        content_id: &str,
        content_type: ContentType,
        note: &str,
    ) -> DbResult<bool> {
        let table = Self::table(content_type);
        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET status = 'flagged', moderation_note = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'flagged'
            "#
        ))
        .bind(content_id)
        .bind(note)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(table, content_id).await? {
            Ok(false)
        } else {
            Err(DbError::NotFound(format!("{content_type} {content_id}")))
        }
    }

    async fn publish(&self, content_id: &str, content_type: ContentType) -> DbResult<bool> {
        let table = Self::table(content_type);
        let result = sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET status = 'published', published_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            "#
        ))
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(table, content_id).await? {
            Ok(false)
        } else {
            Err(DbError::NotFound(format!("{content_type} {content_id}")))
        }
    }
}

/// PostgreSQL implementation of [`CreatorRepo`].
pub struct PgCreatorRepo {
    pool: PgPool,
}

impl PgCreatorRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, chef_id: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM creators WHERE id = $1)")
                .bind(chef_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl CreatorRepo for PgCreatorRepo {
    async fn resolved_violation_count(&self, chef_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM content_reports WHERE creator_id = $1 AND status = 'resolved'",
        )
        .bind(chef_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn suspend(&self, chef_id: &str, note: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE creators
            SET status = 'suspended', moderation_note = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'suspended'
            "#,
        )
        .bind(chef_id)
        .bind(note)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(chef_id).await? {
            Ok(false)
        } else {
            Err(DbError::NotFound(format!("creator {chef_id}")))
        }
    }

    async fn flag(&self, chef_id: &str, note: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE creators
            SET status = 'flagged', moderation_note = $2, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('flagged', 'suspended')
            "#,
        )
        .bind(chef_id)
        .bind(note)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(chef_id).await? {
            Ok(false)
        } else {
            Err(DbError::NotFound(format!("creator {chef_id}")))
        }
    }
}
