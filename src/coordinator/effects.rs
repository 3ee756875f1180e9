//! Side effects applied to one emitted group.
//!
//! Order within a group is persist, provision channel, notify members, remove
//! from queue. A failed persist skips everything after it so the members stay
//! queued; any later failure is recorded and does not stop the remaining steps.

use crate::coordinator::Collaborators;
use crate::core::{Group, MatchedGroup};
use crate::models::{DeliveryStatus, GroupOutcome, NotificationOutcome, StepOutcome};
use crate::services::{with_retry, GroupRecord, Retried, RetryConfig};
use futures::stream::{self, StreamExt};
use uuid::Uuid;

/// Display name for a new group
pub fn group_name(group: &Group) -> String {
    let city = group.profile().city.trim();
    if city.is_empty() {
        "Haven group".to_string()
    } else {
        format!("{} group", city)
    }
}

fn step<T>(retried: &Retried<T>) -> StepOutcome {
    match &retried.result {
        Ok(_) => StepOutcome::Succeeded {
            attempts: retried.attempts,
        },
        Err(e) => StepOutcome::Failed {
            error: e.to_string(),
            attempts: retried.attempts,
        },
    }
}

pub async fn finalize_group(
    collaborators: &Collaborators,
    retry: &RetryConfig,
    notify_limit: usize,
    matched: &MatchedGroup,
) -> GroupOutcome {
    let group_id = Uuid::new_v4();
    let group_name = group_name(&matched.group);
    let member_ids = matched.group.member_ids();

    let mut outcome = GroupOutcome {
        group_id,
        group_name,
        bucket: matched.bucket,
        member_ids,
        host_id: matched.group.host().map(|h| h.user_id.clone()),
        persisted: StepOutcome::Skipped,
        channel: StepOutcome::Skipped,
        notifications: Vec::new(),
        queue_removal: StepOutcome::Skipped,
    };

    let record = GroupRecord {
        group_id,
        name: &outcome.group_name,
        group: &matched.group,
    };
    let record = &record;
    let repository = &collaborators.groups;
    let persisted = with_retry(retry, "persist group", move || {
        repository.persist_group(record)
    })
    .await;
    outcome.persisted = step(&persisted);

    if let Err(e) = &persisted.result {
        tracing::error!(
            "Failed to persist group {} ({}), members stay queued: {}",
            group_id,
            matched.bucket,
            e
        );
        outcome.notifications = outcome
            .member_ids
            .iter()
            .map(|user_id| NotificationOutcome {
                user_id: user_id.clone(),
                status: DeliveryStatus::Skipped,
            })
            .collect();
        return outcome;
    }

    let channel_id = group_id.to_string();
    let (channel_id, name, members) = (&channel_id, &outcome.group_name, &outcome.member_ids);
    let channels = &collaborators.channels;
    let channel = with_retry(retry, "provision channel", move || {
        channels.provision(channel_id, name, members)
    })
    .await;
    if let Err(e) = &channel.result {
        tracing::warn!("Channel provisioning failed for group {}: {}", group_id, e);
    }
    outcome.channel = step(&channel);

    let pending: Vec<_> = members
        .iter()
        .map(|user_id| notify_member(collaborators, retry, user_id, name))
        .collect();
    outcome.notifications = stream::iter(pending)
        .buffered(notify_limit.max(1))
        .collect()
        .await;

    let queue = &collaborators.queue;
    let removal = with_retry(retry, "remove from queue", move || queue.remove(members)).await;
    if let Err(e) = &removal.result {
        tracing::warn!("Queue removal failed for group {}: {}", group_id, e);
    }
    outcome.queue_removal = step(&removal);

    tracing::debug!(
        "Finalized group {} in {} with {} members",
        group_id,
        matched.bucket,
        outcome.member_ids.len()
    );

    outcome
}

async fn notify_member(
    collaborators: &Collaborators,
    retry: &RetryConfig,
    user_id: &str,
    group_name: &str,
) -> NotificationOutcome {
    let contacts = &collaborators.contacts;
    let lookup = with_retry(retry, "contact lookup", move || {
        contacts.contact_address(user_id)
    })
    .await;

    let status = match lookup.result {
        Err(e) => {
            tracing::warn!("Contact lookup failed for {}: {}", user_id, e);
            DeliveryStatus::LookupFailed {
                error: e.to_string(),
            }
        }
        Ok(None) => {
            tracing::warn!("No contact address for {}, skipping notification", user_id);
            DeliveryStatus::NoAddress
        }
        Ok(Some(address)) => {
            let address = address.as_str();
            let notifier = &collaborators.notifier;
            let sent = with_retry(retry, "match notification", move || {
                notifier.notify_matched(address, group_name)
            })
            .await;
            match sent.result {
                Ok(()) => DeliveryStatus::Sent,
                Err(e) => {
                    tracing::warn!("Notification to {} failed: {}", user_id, e);
                    DeliveryStatus::Failed {
                        error: e.to_string(),
                    }
                }
            }
        }
    };

    NotificationOutcome {
        user_id: user_id.to_string(),
        status,
    }
}
