use crate::core::{BucketStats, ExclusionReason};
use crate::models::domain::BucketKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one side-effect step for a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { attempts: u32 },
    Failed { error: String, attempts: u32 },
    Skipped,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// Delivery result of a match notification for one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    NoAddress,
    LookupFailed { error: String },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

/// Everything that happened to one emitted group after matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOutcome {
    #[serde(rename = "groupId")]
    pub group_id: Uuid,
    #[serde(rename = "groupName")]
    pub group_name: String,
    pub bucket: BucketKey,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<String>,
    #[serde(rename = "hostId")]
    pub host_id: Option<String>,
    pub persisted: StepOutcome,
    pub channel: StepOutcome,
    pub notifications: Vec<NotificationOutcome>,
    #[serde(rename = "queueRemoval")]
    pub queue_removal: StepOutcome,
}

/// A group the emission rule kept out of persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionSummary {
    pub bucket: BucketKey,
    pub reason: ExclusionReason,
    #[serde(rename = "memberIds")]
    pub member_ids: Vec<String>,
}

/// Summary of a completed matching run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub total_records: usize,
    pub users_matched: usize,
    pub groups_emitted: usize,
    pub groups_persisted: usize,
    pub groups_excluded: usize,
    pub buckets: Vec<BucketStats>,
    pub groups: Vec<GroupOutcome>,
    pub exclusions: Vec<ExclusionSummary>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub database: String,
    pub run_in_progress: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
