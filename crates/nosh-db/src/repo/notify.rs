//! Admin notifications and the report audit log.

use async_trait::async_trait;
use nosh_core::job::ReportSeverity;
use nosh_core::moderation::NotifyPriority;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbResult;

/// Sink for admin-facing notifications.
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn notify_admin(&self, priority: NotifyPriority, title: &str, body: &str)
    -> DbResult<()>;
}

/// Append-only audit log for high-severity report alerts.
#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn record_report_alert(&self, report_id: &str, severity: ReportSeverity)
    -> DbResult<()>;
}

/// PostgreSQL implementation of [`NotificationRepo`].
pub struct PgNotificationRepo {
    pool: PgPool,
}

impl PgNotificationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepo for PgNotificationRepo {
    async fn notify_admin(
        &self,
        priority: NotifyPriority,
        title: &str,
        body: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_notifications (id, priority, title, body, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(priority.as_str())
        .bind(title)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// PostgreSQL implementation of [`AuditRepo`].
pub struct PgAuditRepo {
    pool: PgPool,
}

impl PgAuditRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepo for PgAuditRepo {
    async fn record_report_alert(
        &self,
        report_id: &str,
        severity: ReportSeverity,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO report_audit (id, report_id, severity, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(report_id)
        .bind(severity.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
