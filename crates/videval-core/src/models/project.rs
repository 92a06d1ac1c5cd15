use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::StatusMessage;
use crate::error::AppError;

/// How worker identities are recorded on collected assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerIdentity {
    #[default]
    Anonymous,
    Hashed,
    Numbered,
    Username,
}

impl WorkerIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerIdentity::Anonymous => "anonymous",
            WorkerIdentity::Hashed => "hashed",
            WorkerIdentity::Numbered => "numbered",
            WorkerIdentity::Username => "username",
        }
    }
}

impl std::str::FromStr for WorkerIdentity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anonymous" => Ok(WorkerIdentity::Anonymous),
            "hashed" => Ok(WorkerIdentity::Hashed),
            "numbered" => Ok(WorkerIdentity::Numbered),
            "username" => Ok(WorkerIdentity::Username),
            other => Err(AppError::InvalidInput(format!(
                "unknown worker identity policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    EqualTo,
    NotEqualTo,
    Exists,
    DoesNotExist,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionsGuarded {
    Accept,
    PreviewAndAccept,
    DiscoverPreviewAndAccept,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocaleValue {
    pub country: String,
    pub subdivision: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct QualificationRequirement {
    #[validate(length(min = 1))]
    pub qualification_type_id: String,
    pub comparator: Comparator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_values: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_values: Option<Vec<LocaleValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_guarded: Option<ActionsGuarded>,
}

/// Settings for publishing a project's segments as crowdsourcing jobs.
///
/// Field names follow the remote API (`LifetimeInSeconds`, `Reward`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct HitSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approval_delay_in_seconds: Option<u64>,
    pub assignment_duration_in_seconds: u64,
    #[validate(length(min = 1))]
    pub reward: String,
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default)]
    #[validate(nested)]
    pub qualification_requirements: Vec<QualificationRequirement>,
    #[validate(range(min = 1))]
    pub lifetime_in_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub max_assignments: Option<u32>,
}

impl HitSettings {
    /// Parse and validate settings JSON.
    pub fn parse(json: &str) -> Result<Self, AppError> {
        let settings: HitSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub hit_settings: HitSettings,
    pub worker_identity: WorkerIdentity,
    pub is_busy: bool,
    pub is_started: bool,
    /// Group identifier returned by the remote gateway once jobs are posted.
    pub batch_id: Option<String>,
    pub messages: Vec<StatusMessage>,
    pub created_at: DateTime<Utc>,
}

/// One segment published as a remote job within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionTask {
    pub id: Uuid,
    pub project_id: Uuid,
    pub segment_id: Uuid,
    pub remote_job_id: Option<String>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub remote_assignment_id: String,
    /// Worker label after the project's identity policy was applied.
    pub worker_label: Option<String>,
    /// `None` while submitted but not yet reviewed.
    pub is_approved: Option<bool>,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
