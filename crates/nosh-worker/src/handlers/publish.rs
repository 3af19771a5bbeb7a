//! Scheduled content publication.

use tracing::{debug, info};

use nosh_core::Result;
use nosh_core::job::ContentType;

use super::Handlers;

/// Move a piece of scheduled content to published.
///
/// Only the scheduled -> published transition is performed; content that was
/// already published, or that moderation pulled out of the schedule, is left
/// alone so a retried job cannot overwrite a later decision.
pub(super) async fn publish_content(
    deps: &Handlers,
    content_id: &str,
    content_type: ContentType,
) -> Result<()> {
    let published = deps.content.publish(content_id, content_type).await?;
    if published {
        info!(content_id, %content_type, "content published");
    } else {
        debug!(content_id, %content_type, "content not in scheduled state, nothing to publish");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nosh_core::Error;
    use nosh_core::moderation::ModerationConfig;
    use nosh_db::memory::{
        MemoryAuditRepo, MemoryContentRepo, MemoryCreatorRepo, MemoryModerationConfigSource,
        MemoryNotificationRepo,
    };
    use std::sync::Arc;

    fn handlers(content: Arc<MemoryContentRepo>) -> Handlers {
        Handlers {
            config: Arc::new(MemoryModerationConfigSource::new(
                ModerationConfig::default(),
            )),
            content,
            creators: Arc::new(MemoryCreatorRepo::new()),
            notifications: Arc::new(MemoryNotificationRepo::new()),
            audit: Arc::new(MemoryAuditRepo::new()),
        }
    }

    #[tokio::test]
    async fn publishes_scheduled_content() {
        let content = Arc::new(MemoryContentRepo::new());
        content.seed("v1", ContentType::Video, "scheduled");
        let deps = handlers(content.clone());

        publish_content(&deps, "v1", ContentType::Video).await.unwrap();

        assert_eq!(
            content.status_of("v1", ContentType::Video).as_deref(),
            Some("published")
        );
    }

    #[tokio::test]
    async fn republish_is_a_no_op() {
        let content = Arc::new(MemoryContentRepo::new());
        content.seed("p1", ContentType::Post, "scheduled");
        let deps = handlers(content.clone());

        publish_content(&deps, "p1", ContentType::Post).await.unwrap();
        publish_content(&deps, "p1", ContentType::Post).await.unwrap();

        assert_eq!(
            content.status_of("p1", ContentType::Post).as_deref(),
            Some("published")
        );
    }

    #[tokio::test]
    async fn flagged_content_stays_flagged() {
        let content = Arc::new(MemoryContentRepo::new());
        content.seed("v1", ContentType::Video, "flagged");
        let deps = handlers(content.clone());

        publish_content(&deps, "v1", ContentType::Video).await.unwrap();

        assert_eq!(
            content.status_of("v1", ContentType::Video).as_deref(),
            Some("flagged")
        );
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let deps = handlers(Arc::new(MemoryContentRepo::new()));
        let err = publish_content(&deps, "ghost", ContentType::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
