//! Moderation configuration.

use serde::{Deserialize, Serialize};

/// Process-wide moderation settings, editable by admins at runtime.
///
/// Handlers load this fresh on every invocation so configuration edits take
/// effect without redeploying workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    pub prohibited_keywords: Vec<String>,
    pub violation_threshold: u32,
    pub auto_suspend_enabled: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            prohibited_keywords: Vec::new(),
            violation_threshold: 3,
            auto_suspend_enabled: false,
        }
    }
}

impl ModerationConfig {
    /// Case-insensitive substring scan of `text` against the prohibited list.
    /// Returns the keywords that matched, in configuration order.
    pub fn matched_keywords(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.prohibited_keywords
            .iter()
            .filter(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
            .cloned()
            .collect()
    }
}

/// Priority attached to admin notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPriority {
    Normal,
    High,
    Urgent,
}

impl NotifyPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyPriority::Normal => "normal",
            NotifyPriority::High => "high",
            NotifyPriority::Urgent => "urgent",
        }
    }
}
