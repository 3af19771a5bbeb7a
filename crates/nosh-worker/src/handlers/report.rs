//! Report-alert auditing.

use tracing::debug;

use nosh_core::Result;
use nosh_core::job::ReportSeverity;

use super::Handlers;

/// Record an audit entry for a high-severity user report. Low and normal
/// severities are dropped here rather than at enqueue time, so a severity
/// downgrade between enqueue and dispatch still takes effect.
pub(super) async fn alert(
    deps: &Handlers,
    report_id: &str,
    severity: ReportSeverity,
) -> Result<()> {
    if !severity.is_alertable() {
        debug!(report_id, ?severity, "report below alert severity");
        return Ok(());
    }
    deps.audit.record_report_alert(report_id, severity).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::moderation::ModerationConfig;
    use nosh_db::memory::{
        MemoryAuditRepo, MemoryContentRepo, MemoryCreatorRepo, MemoryModerationConfigSource,
        MemoryNotificationRepo,
    };
    use std::sync::Arc;

    fn handlers(audit: Arc<MemoryAuditRepo>) -> Handlers {
        Handlers {
            config: Arc::new(MemoryModerationConfigSource::new(
                ModerationConfig::default(),
            )),
            content: Arc::new(MemoryContentRepo::new()),
            creators: Arc::new(MemoryCreatorRepo::new()),
            notifications: Arc::new(MemoryNotificationRepo::new()),
            audit,
        }
    }

    #[tokio::test]
    async fn high_and_urgent_reports_are_audited() {
        let audit = Arc::new(MemoryAuditRepo::new());
        let deps = handlers(audit.clone());

        alert(&deps, "r1", ReportSeverity::High).await.unwrap();
        alert(&deps, "r2", ReportSeverity::Urgent).await.unwrap();

        assert_eq!(audit.entries().len(), 2);
    }

    #[tokio::test]
    async fn low_severity_reports_are_dropped() {
        let audit = Arc::new(MemoryAuditRepo::new());
        let deps = handlers(audit.clone());

        alert(&deps, "r1", ReportSeverity::Low).await.unwrap();
        alert(&deps, "r2", ReportSeverity::Normal).await.unwrap();

        assert!(audit.entries().is_empty());
    }
}
