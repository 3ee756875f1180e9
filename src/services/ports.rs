use crate::core::Group;
use crate::models::PreferenceRecord;
use crate::services::{chat::ChatError, notifier::NotifyError, postgres::PostgresError};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by any external collaborator
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] PostgresError),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether repeating the call could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Store(e) => e.is_transient(),
            ServiceError::Chat(e) => e.is_transient(),
            ServiceError::Notify(e) => e.is_transient(),
            ServiceError::Unavailable(_) => true,
        }
    }
}

/// A group ready to be written, with its generated id
#[derive(Debug, Clone)]
pub struct GroupRecord<'a> {
    pub group_id: Uuid,
    pub name: &'a str,
    pub group: &'a Group,
}

/// Pending-preference queue
#[async_trait]
pub trait PreferenceQueue: Send + Sync {
    /// Every pending record, in queue order
    async fn snapshot(&self) -> Result<Vec<PreferenceRecord>, ServiceError>;

    /// Remove the given users from the queue. Returns the number of rows removed.
    async fn remove(&self, user_ids: &[String]) -> Result<u64, ServiceError>;
}

/// Storage for formed groups and their membership rows
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn persist_group(&self, record: &GroupRecord<'_>) -> Result<(), ServiceError>;
}

/// Chat channel provisioning; an already existing channel counts as success
#[async_trait]
pub trait ChannelProvisioner: Send + Sync {
    async fn provision(
        &self,
        group_id: &str,
        group_name: &str,
        member_ids: &[String],
    ) -> Result<(), ServiceError>;
}

/// Lookup of a user's notification address
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, ServiceError>;
}

/// Match notification delivery, one recipient at a time
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_matched(&self, address: &str, group_name: &str) -> Result<(), ServiceError>;
}

/// Liveness of a backing store, reported by the health endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}
