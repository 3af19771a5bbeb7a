//! Job lifecycle types and the typed payload union.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The background job kinds this pipeline processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ModerationCheck,
    ContentPublish,
    ReportAlert,
    EvaluateCreator,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ModerationCheck => "moderation_check",
            JobType::ContentPublish => "content_publish",
            JobType::ReportAlert => "report_alert",
            JobType::EvaluateCreator => "evaluate_creator",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moderation_check" => Ok(JobType::ModerationCheck),
            "content_publish" => Ok(JobType::ContentPublish),
            "report_alert" => Ok(JobType::ReportAlert),
            "evaluate_creator" => Ok(JobType::EvaluateCreator),
            other => Err(crate::Error::Validation(format!(
                "unknown job type: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a job row.
///
/// A job moves pending -> processing -> completed or failed. Completed and
/// failed rows are retained for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler-specific job payload, stored as JSONB on the job row.
///
/// The payload is a tagged union so the dispatcher can match exhaustively;
/// the tag doubles as the `job_type` column value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobPayload {
    ModerationCheck {
        content_id: String,
        content_type: ContentType,
        text: String,
    },
    ContentPublish {
        content_id: String,
        content_type: ContentType,
    },
    ReportAlert {
        report_id: String,
        severity: ReportSeverity,
    },
    EvaluateCreator {
        chef_id: String,
    },
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::ModerationCheck { .. } => JobType::ModerationCheck,
            JobPayload::ContentPublish { .. } => JobType::ContentPublish,
            JobPayload::ReportAlert { .. } => JobType::ReportAlert,
            JobPayload::EvaluateCreator { .. } => JobType::EvaluateCreator,
        }
    }
}

/// What kind of content a moderation or publish job refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Video,
    Post,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Post => "post",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a user report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSeverity {
    Low,
    Normal,
    High,
    Urgent,
}

impl ReportSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSeverity::Low => "low",
            ReportSeverity::Normal => "normal",
            ReportSeverity::High => "high",
            ReportSeverity::Urgent => "urgent",
        }
    }

    /// Only high and urgent reports produce an audit entry.
    pub fn is_alertable(&self) -> bool {
        matches!(self, ReportSeverity::High | ReportSeverity::Urgent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tag_matches_job_type() {
        let payload = JobPayload::ModerationCheck {
            content_id: "v1".into(),
            content_type: ContentType::Video,
            text: "hello".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["job_type"], "moderation_check");
        assert_eq!(payload.job_type().as_str(), "moderation_check");
    }

    #[test]
    fn job_type_round_trips_through_str() {
        for ty in [
            JobType::ModerationCheck,
            JobType::ContentPublish,
            JobType::ReportAlert,
            JobType::EvaluateCreator,
        ] {
            assert_eq!(ty.as_str().parse::<JobType>().unwrap(), ty);
        }
        assert!("email".parse::<JobType>().is_err());
    }

    #[test]
    fn only_high_and_urgent_reports_alert() {
        assert!(!ReportSeverity::Low.is_alertable());
        assert!(!ReportSeverity::Normal.is_alertable());
        assert!(ReportSeverity::High.is_alertable());
        assert!(ReportSeverity::Urgent.is_alertable());
    }
}
