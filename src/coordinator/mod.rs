//! Run coordination: one queue snapshot in, persisted groups and a summary out.

pub mod effects;
pub mod lock;

pub use effects::{finalize_group, group_name};
pub use lock::{RunGuard, RunLock};

use crate::core::Matcher;
use crate::models::{ExclusionSummary, RunSummary};
use crate::services::{
    with_retry, ChannelProvisioner, ContactDirectory, GroupRepository, Notifier, PreferenceQueue,
    RetryConfig, ServiceError,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::Instrument;

/// Reasons a run can be refused or aborted
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {active_run_id} is already in progress")]
    AlreadyRunning { active_run_id: u64 },

    #[error("failed to read the preference queue: {0}")]
    QueueSource(ServiceError),

    #[error("run task ended abnormally: {0}")]
    Interrupted(String),
}

/// Upper bounds on side effects in flight during one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Groups finalized at the same time
    pub groups: usize,
    /// Member notifications in flight per group
    pub notifications: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            groups: 8,
            notifications: 4,
        }
    }
}

/// External collaborators of a run
#[derive(Clone)]
pub struct Collaborators {
    pub queue: Arc<dyn PreferenceQueue>,
    pub groups: Arc<dyn GroupRepository>,
    pub channels: Arc<dyn ChannelProvisioner>,
    pub contacts: Arc<dyn ContactDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

/// Drives matching runs and keeps the most recent summary
pub struct RunCoordinator {
    matcher: Matcher,
    collaborators: Collaborators,
    retry: RetryConfig,
    limits: RunLimits,
    lock: RunLock,
    last_summary: RwLock<Option<RunSummary>>,
}

impl RunCoordinator {
    pub fn new(matcher: Matcher, collaborators: Collaborators, retry: RetryConfig) -> Self {
        Self {
            matcher,
            collaborators,
            retry,
            limits: RunLimits::default(),
            lock: RunLock::new(),
            last_summary: RwLock::new(None),
        }
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = RunLimits {
            groups: limits.groups.max(1),
            notifications: limits.notifications.max(1),
        };
        self
    }

    /// Start a run on its own task and wait for it.
    ///
    /// The run goes on to completion even if the caller stops waiting, so a
    /// dropped request can never leave persisted groups in the queue.
    pub async fn trigger(self: Arc<Self>) -> Result<RunSummary, RunError> {
        let handle = tokio::spawn(async move { self.run().await });
        handle
            .await
            .map_err(|e| RunError::Interrupted(e.to_string()))?
    }

    /// Run one matching pass over the current queue on the caller's task.
    ///
    /// Refused with `AlreadyRunning` if another run holds the lock. Dropping
    /// the returned future abandons the run midway; callers that may be
    /// cancelled go through `trigger`.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let guard = self
            .lock
            .try_acquire()
            .map_err(|active_run_id| RunError::AlreadyRunning { active_run_id })?;
        let run_id = guard.run_id();

        let span = tracing::info_span!("match_run", run_id);
        let summary = self.execute(run_id).instrument(span).await?;

        *self.last_summary.write().await = Some(summary.clone());
        drop(guard);

        Ok(summary)
    }

    async fn execute(&self, run_id: u64) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        tracing::info!("Match run started");

        let queue = &self.collaborators.queue;
        let snapshot = with_retry(&self.retry, "queue snapshot", move || queue.snapshot()).await;
        let records = snapshot.result.map_err(|e| {
            tracing::error!("Match run aborted, queue unavailable: {}", e);
            RunError::QueueSource(e)
        })?;
        let total_records = records.len();

        let result = self.matcher.match_users(records);

        // buffered keeps the summary in emission order
        let pending: Vec<_> = result
            .groups
            .iter()
            .map(|matched| {
                finalize_group(
                    &self.collaborators,
                    &self.retry,
                    self.limits.notifications,
                    matched,
                )
            })
            .collect();
        let groups: Vec<_> = stream::iter(pending)
            .buffered(self.limits.groups)
            .collect()
            .await;

        let exclusions: Vec<ExclusionSummary> = result
            .excluded
            .iter()
            .map(|excluded| ExclusionSummary {
                bucket: excluded.bucket,
                reason: excluded.reason,
                member_ids: excluded.group.member_ids(),
            })
            .collect();

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_records,
            users_matched: result.matched_users(),
            groups_emitted: groups.len(),
            groups_persisted: groups.iter().filter(|g| g.persisted.is_success()).count(),
            groups_excluded: exclusions.len(),
            buckets: result.buckets,
            groups,
            exclusions,
        };

        tracing::info!(
            "Match run finished: {} records, {} groups emitted, {} persisted, {} excluded",
            summary.total_records,
            summary.groups_emitted,
            summary.groups_persisted,
            summary.groups_excluded
        );

        Ok(summary)
    }

    /// Summary of the most recent completed run
    pub async fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.read().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock.active_run().is_some()
    }

    pub fn active_run(&self) -> Option<u64> {
        self.lock.active_run()
    }
}
