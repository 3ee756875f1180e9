use crate::config::SchedulerSettings;
use crate::coordinator::{RunCoordinator, RunError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Start the periodic matching trigger.
///
/// Returns `None` when the scheduler is disabled. A tick that finds a run in
/// progress is logged and skipped.
pub fn spawn(coordinator: Arc<RunCoordinator>, settings: &SchedulerSettings) -> Option<JoinHandle<()>> {
    if !settings.enabled {
        tracing::info!("Match scheduler disabled");
        return None;
    }

    let period = Duration::from_secs(settings.interval_secs.max(1));
    let run_on_startup = settings.run_on_startup;

    tracing::info!("Match scheduler started, interval {:?}", period);

    Some(tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // the first tick completes immediately
        if !run_on_startup {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            run_once(coordinator.clone()).await;
        }
    }))
}

async fn run_once(coordinator: Arc<RunCoordinator>) {
    match coordinator.trigger().await {
        Ok(summary) => tracing::debug!(
            "Scheduled run {} emitted {} groups",
            summary.run_id,
            summary.groups_emitted
        ),
        Err(RunError::AlreadyRunning { active_run_id }) => {
            tracing::info!("Skipping scheduled run, run {} still active", active_run_id)
        }
        Err(e) => tracing::error!("Scheduled run failed: {}", e),
    }
}
