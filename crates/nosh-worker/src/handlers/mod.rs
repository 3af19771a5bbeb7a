//! Type-specific job handlers.
//!
//! Every handler is idempotent and side-effect-scoped to one domain entity:
//! a retried job may repeat a no-op transition but never duplicates
//! notifications or reverses an earlier moderation decision.

mod moderation;
mod publish;
mod report;

use std::sync::Arc;

use nosh_core::{JobPayload, Result};
use nosh_db::{AuditRepo, ContentRepo, CreatorRepo, ModerationConfigSource, NotificationRepo};

/// The collaborators handlers run against, injectable for tests.
#[derive(Clone)]
pub struct Handlers {
    pub config: Arc<dyn ModerationConfigSource>,
    pub content: Arc<dyn ContentRepo>,
    pub creators: Arc<dyn CreatorRepo>,
    pub notifications: Arc<dyn NotificationRepo>,
    pub audit: Arc<dyn AuditRepo>,
}

impl Handlers {
    /// Route a decoded payload to its handler. The match is exhaustive: a new
    /// job type cannot be added without a handler.
    pub async fn handle(&self, payload: JobPayload) -> Result<()> {
        match payload {
            JobPayload::ModerationCheck {
                content_id,
                content_type,
                text,
            } => moderation::check_content(self, &content_id, content_type, &text).await,
            JobPayload::ContentPublish {
                content_id,
                content_type,
            } => publish::publish_content(self, &content_id, content_type).await,
            JobPayload::ReportAlert {
                report_id,
                severity,
            } => report::alert(self, &report_id, severity).await,
            JobPayload::EvaluateCreator { chef_id } => {
                moderation::evaluate_creator(self, &chef_id).await
            }
        }
    }
}
