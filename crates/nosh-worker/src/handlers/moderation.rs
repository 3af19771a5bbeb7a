//! Keyword moderation and creator evaluation.

use tracing::{debug, info};

use nosh_core::Result;
use nosh_core::job::ContentType;
use nosh_core::moderation::NotifyPriority;

use super::Handlers;

/// Scan content text against the prohibited-keyword list; flag the content
/// and alert admins on a match.
///
/// Config is loaded fresh on every invocation so admin edits apply without a
/// redeploy. The admin notification fires only when the flag transition
/// actually happened, so retried jobs stay quiet.
pub(super) async fn check_content(
    deps: &Handlers,
    content_id: &str,
    content_type: ContentType,
    text: &str,
) -> Result<()> {
    let config = deps.config.load().await?;
    let matched = config.matched_keywords(text);
    if matched.is_empty() {
        debug!(content_id, "no prohibited keywords matched");
        return Ok(());
    }

    let note = format!("Flagged for prohibited keywords: {}", matched.join(", "));
    let newly_flagged = deps.content.flag(content_id, content_type, &note).await?;
    info!(content_id, %content_type, keywords = ?matched, newly_flagged, "content flagged");

    if newly_flagged {
        deps.notifications
            .notify_admin(
                NotifyPriority::High,
                "Content flagged by moderation",
                &format!("{content_type} {content_id} flagged: {note}"),
            )
            .await?;
    }
    Ok(())
}

/// Evaluate a creator's resolved-violation count against the configured
/// threshold; suspend or flag them when it is met.
pub(super) async fn evaluate_creator(deps: &Handlers, chef_id: &str) -> Result<()> {
    let config = deps.config.load().await?;
    let count = deps.creators.resolved_violation_count(chef_id).await?;
    if count < i64::from(config.violation_threshold) {
        debug!(
            chef_id,
            count, threshold = config.violation_threshold, "creator below violation threshold"
        );
        return Ok(());
    }

    let note = format!(
        "{count} resolved violations (threshold {})",
        config.violation_threshold
    );
    let (transitioned, action) = if config.auto_suspend_enabled {
        (deps.creators.suspend(chef_id, &note).await?, "suspended")
    } else {
        (deps.creators.flag(chef_id, &note).await?, "flagged")
    };
    info!(chef_id, action, transitioned, "creator evaluated");

    if transitioned {
        deps.notifications
            .notify_admin(
                NotifyPriority::Urgent,
                &format!("Creator {action}"),
                &format!("Creator {chef_id} {action}: {note}"),
            )
            .await?;
    }
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

    struct Fixture {
        config: Arc<MemoryModerationConfigSource>,
        content: Arc<MemoryContentRepo>,
        creators: Arc<MemoryCreatorRepo>,
        notifications: Arc<MemoryNotificationRepo>,
        handlers: Handlers,
    }

    fn fixture(config: ModerationConfig) -> Fixture {
        let config = Arc::new(MemoryModerationConfigSource::new(config));
        let content = Arc::new(MemoryContentRepo::new());
        let creators = Arc::new(MemoryCreatorRepo::new());
        let notifications = Arc::new(MemoryNotificationRepo::new());
        let handlers = Handlers {
            config: config.clone(),
            content: content.clone(),
            creators: creators.clone(),
            notifications: notifications.clone(),
            audit: Arc::new(MemoryAuditRepo::new()),
        };
        Fixture {
            config,
            content,
            creators,
            notifications,
            handlers,
        }
    }

    fn keyword_config(keywords: &[&str]) -> ModerationConfig {
        ModerationConfig {
            prohibited_keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ..ModerationConfig::default()
        }
    }

    #[tokio::test]
    async fn flags_matching_content_with_keyword_note() {
        let fx = fixture(keyword_config(&["scam"]));
        fx.content.seed("v1", ContentType::Video, "published");

        check_content(&fx.handlers, "v1", ContentType::Video, "this is a scam offer")
            .await
            .unwrap();

        assert_eq!(
            fx.content.status_of("v1", ContentType::Video).as_deref(),
            Some("flagged")
        );
        let note = fx.content.note_of("v1", ContentType::Video).unwrap();
        assert!(note.contains("scam"));
        let sent = fx.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, NotifyPriority::High);
    }

    #[tokio::test]
    async fn clean_text_leaves_content_untouched() {
        let fx = fixture(keyword_config(&["scam"]));
        fx.content.seed("v1", ContentType::Video, "published");

        check_content(&fx.handlers, "v1", ContentType::Video, "a lovely lasagna")
            .await
            .unwrap();

        assert_eq!(
            fx.content.status_of("v1", ContentType::Video).as_deref(),
            Some("published")
        );
        assert!(fx.notifications.sent().is_empty());
    }

    #[tokio::test]
    async fn retried_check_does_not_duplicate_notifications() {
        let fx = fixture(keyword_config(&["scam"]));
        fx.content.seed("v1", ContentType::Video, "published");

        for _ in 0..3 {
            check_content(&fx.handlers, "v1", ContentType::Video, "scam")
                .await
                .unwrap();
        }

        assert_eq!(fx.notifications.sent().len(), 1);
    }

    #[tokio::test]
    async fn config_edits_apply_without_redeploy() {
        let fx = fixture(keyword_config(&[]));
        fx.content.seed("v1", ContentType::Post, "published");

        check_content(&fx.handlers, "v1", ContentType::Post, "scam")
            .await
            .unwrap();
        assert_eq!(
            fx.content.status_of("v1", ContentType::Post).as_deref(),
            Some("published")
        );

        fx.config.set(keyword_config(&["scam"]));
        check_content(&fx.handlers, "v1", ContentType::Post, "scam")
            .await
            .unwrap();
        assert_eq!(
            fx.content.status_of("v1", ContentType::Post).as_deref(),
            Some("flagged")
        );
    }

    #[tokio::test]
    async fn creator_below_threshold_is_untouched() {
        let fx = fixture(ModerationConfig {
            violation_threshold: 3,
            ..ModerationConfig::default()
        });
        fx.creators.seed("chef-1");
        fx.creators.set_violations("chef-1", 2);

        evaluate_creator(&fx.handlers, "chef-1").await.unwrap();

        assert_eq!(fx.creators.status_of("chef-1").as_deref(), Some("active"));
        assert!(fx.notifications.sent().is_empty());
    }

    #[tokio::test]
    async fn creator_at_threshold_is_flagged_when_autosuspend_off() {
        let fx = fixture(ModerationConfig {
            violation_threshold: 3,
            auto_suspend_enabled: false,
            ..ModerationConfig::default()
        });
        fx.creators.seed("chef-1");
        fx.creators.set_violations("chef-1", 3);

        evaluate_creator(&fx.handlers, "chef-1").await.unwrap();

        assert_eq!(fx.creators.status_of("chef-1").as_deref(), Some("flagged"));
        let note = fx.creators.note_of("chef-1").unwrap();
        assert!(note.contains('3'));
        let sent = fx.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, NotifyPriority::Urgent);
        assert!(sent[0].body.contains("flagged"));
    }

    #[tokio::test]
    async fn creator_at_threshold_is_suspended_when_autosuspend_on() {
        let fx = fixture(ModerationConfig {
            violation_threshold: 3,
            auto_suspend_enabled: true,
            ..ModerationConfig::default()
        });
        fx.creators.seed("chef-1");
        fx.creators.set_violations("chef-1", 5);

        evaluate_creator(&fx.handlers, "chef-1").await.unwrap();

        assert_eq!(
            fx.creators.status_of("chef-1").as_deref(),
            Some("suspended")
        );
        let sent = fx.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("suspended"));
    }

    #[tokio::test]
    async fn re_evaluating_a_suspended_creator_is_quiet() {
        let fx = fixture(ModerationConfig {
            violation_threshold: 1,
            auto_suspend_enabled: true,
            ..ModerationConfig::default()
        });
        fx.creators.seed("chef-1");
        fx.creators.set_violations("chef-1", 1);

        evaluate_creator(&fx.handlers, "chef-1").await.unwrap();
        evaluate_creator(&fx.handlers, "chef-1").await.unwrap();

        assert_eq!(fx.notifications.sent().len(), 1);
    }
}
