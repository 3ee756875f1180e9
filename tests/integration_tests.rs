// Integration tests for Haven Algo

use async_trait::async_trait;
use haven_algo::coordinator::{Collaborators, RunCoordinator, RunError, RunLimits};
use haven_algo::core::{ExclusionReason, Matcher};
use haven_algo::models::{
    DeliveryStatus, Gender, MatchingPolicy, PlacementPolicy, PreferenceRecord, ScoringWeights,
    StepOutcome,
};
use haven_algo::services::{
    ChannelProvisioner, ContactDirectory, GroupRecord, GroupRepository, Notifier, PreferenceQueue,
    RetryConfig, ServiceError,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn create_test_record(
    id: &str,
    age: i32,
    pref: (i32, i32),
    city: &str,
    size: (i32, i32),
    is_host: bool,
) -> PreferenceRecord {
    PreferenceRecord {
        user_id: id.to_string(),
        gender: Gender::Other,
        is_trusted: false,
        same_gender_only: false,
        age,
        min_age_pref: pref.0,
        max_age_pref: pref.1,
        city: city.to_string(),
        is_host,
        min_group_size: size.0,
        max_group_size: size.1,
        interests: BTreeSet::new(),
    }
}

fn scenario() -> Vec<PreferenceRecord> {
    vec![
        create_test_record("U1", 25, (20, 30), "A", (2, 4), true),
        create_test_record("U2", 26, (20, 32), "A", (2, 4), false),
        create_test_record("U3", 50, (45, 60), "B", (2, 3), true),
    ]
}

fn ids(group: &haven_algo::Group) -> Vec<String> {
    group.member_ids()
}

#[test]
fn test_end_to_end_scenario() {
    let matcher = Matcher::default();
    let result = matcher.match_users(scenario());

    assert_eq!(result.total_users, 3);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(ids(&result.groups[0].group), vec!["U1", "U2"]);
    assert_eq!(result.groups[0].group.host_ids(), vec!["U1"]);

    assert_eq!(result.excluded.len(), 1);
    assert_eq!(ids(&result.excluded[0].group), vec!["U3"]);
    assert_eq!(result.excluded[0].reason, ExclusionReason::Singleton);
}

#[test]
fn test_matching_is_deterministic() {
    let matcher = Matcher::default();
    let mut users = scenario();
    users.extend((0..20).map(|i| {
        create_test_record(&format!("X{}", i), 20 + i, (18 + i, 30 + i), "A", (2, 5), i % 3 == 0)
    }));

    let first = matcher.match_users(users.clone());
    let second = matcher.match_users(users);

    let a: Vec<Vec<String>> = first.groups.iter().map(|g| ids(&g.group)).collect();
    let b: Vec<Vec<String>> = second.groups.iter().map(|g| ids(&g.group)).collect();
    assert_eq!(a, b);
    assert_eq!(first.buckets, second.buckets);
}

#[test]
fn test_every_user_lands_in_exactly_one_group() {
    let matcher = Matcher::default();
    let users: Vec<PreferenceRecord> = (0..40)
        .map(|i| {
            let mut user = create_test_record(
                &format!("P{}", i),
                20 + (i % 15),
                (18, 40),
                if i % 2 == 0 { "A" } else { "B" },
                (2, 4),
                i % 4 == 0,
            );
            user.is_trusted = i % 5 == 0;
            user
        })
        .collect();

    let result = matcher.match_users(users);

    let mut seen = BTreeSet::new();
    for group in result
        .groups
        .iter()
        .map(|g| &g.group)
        .chain(result.excluded.iter().map(|e| &e.group))
    {
        for id in group.member_ids() {
            assert!(seen.insert(id.clone()), "{} placed twice", id);
        }
    }
    assert_eq!(seen.len(), 40);

    for matched in &result.groups {
        assert!(matched.group.len() > 1);
        assert_eq!(matched.group.host_count(), 1);
    }
}

#[test]
fn test_extra_host_moves_to_hostless_group() {
    let matcher = Matcher::default();
    let users = vec![
        create_test_record("H1", 25, (20, 30), "A", (2, 4), true),
        create_test_record("H2", 30, (20, 45), "A", (2, 4), true),
        create_test_record("U", 25, (20, 30), "A", (2, 4), false),
        create_test_record("M", 40, (35, 45), "A", (2, 4), false),
    ];

    let result = matcher.match_users(users);

    let groups: Vec<Vec<String>> = result.groups.iter().map(|g| ids(&g.group)).collect();
    assert_eq!(groups, vec![vec!["H1", "U"], vec!["M", "H2"]]);
    assert!(result.excluded.is_empty());
    assert_eq!(result.buckets.iter().map(|b| b.hosts_moved).sum::<usize>(), 1);
}

#[test]
fn test_best_fit_policy_is_configurable() {
    let policy = MatchingPolicy {
        join_threshold: 80.0,
        placement: PlacementPolicy::BestFit,
    };
    let matcher = Matcher::new(ScoringWeights::default(), policy);
    let result = matcher.match_users(scenario());

    assert_eq!(result.groups.len(), 1);
    assert_eq!(ids(&result.groups[0].group), vec!["U1", "U2"]);
}

// In-memory collaborators

#[derive(Default)]
struct FakeStore {
    queue: Mutex<Vec<PreferenceRecord>>,
    fail_snapshot: bool,
    fail_persist_for: Option<String>,
    persisted: Mutex<Vec<Vec<String>>>,
    emails: HashMap<String, String>,
    hold_snapshot: Option<Arc<Notify>>,
    remove_delay: Option<Duration>,
}

impl FakeStore {
    fn with_queue(records: Vec<PreferenceRecord>) -> Self {
        let emails = records
            .iter()
            .map(|r| (r.user_id.clone(), format!("{}@example.com", r.user_id.to_lowercase())))
            .collect();
        Self {
            queue: Mutex::new(records),
            emails,
            ..Self::default()
        }
    }

    fn queued_ids(&self) -> Vec<String> {
        self.queue.lock().unwrap().iter().map(|r| r.user_id.clone()).collect()
    }
}

#[async_trait]
impl PreferenceQueue for FakeStore {
    async fn snapshot(&self) -> Result<Vec<PreferenceRecord>, ServiceError> {
        if let Some(gate) = &self.hold_snapshot {
            gate.notified().await;
        }
        if self.fail_snapshot {
            return Err(ServiceError::Unavailable("queue offline".to_string()));
        }
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn remove(&self, user_ids: &[String]) -> Result<u64, ServiceError> {
        if let Some(delay) = self.remove_delay {
            tokio::time::sleep(delay).await;
        }
        let mut queue = self.queue.lock().unwrap();
        let before = queue.len();
        queue.retain(|r| !user_ids.contains(&r.user_id));
        Ok((before - queue.len()) as u64)
    }
}

#[async_trait]
impl GroupRepository for FakeStore {
    async fn persist_group(&self, record: &GroupRecord<'_>) -> Result<(), ServiceError> {
        let members = record.group.member_ids();
        if let Some(failing) = &self.fail_persist_for {
            if members.contains(failing) {
                return Err(ServiceError::Unavailable("write rejected".to_string()));
            }
        }
        self.persisted.lock().unwrap().push(members);
        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for FakeStore {
    async fn contact_address(&self, user_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.emails.get(user_id).cloned())
    }
}

#[derive(Default)]
struct FakeChat {
    channels: Mutex<Vec<(String, String, Vec<String>)>>,
}

#[async_trait]
impl ChannelProvisioner for FakeChat {
    async fn provision(
        &self,
        group_id: &str,
        group_name: &str,
        member_ids: &[String],
    ) -> Result<(), ServiceError> {
        self.channels.lock().unwrap().push((
            group_id.to_string(),
            group_name.to_string(),
            member_ids.to_vec(),
        ));
        Ok(())
    }
}

#[derive(Default)]
struct FakeMail {
    sent: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Notifier for FakeMail {
    async fn notify_matched(&self, address: &str, _group_name: &str) -> Result<(), ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(address.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 1,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
    }
}

fn coordinator(store: Arc<FakeStore>, chat: Arc<FakeChat>, mail: Arc<FakeMail>) -> RunCoordinator {
    let collaborators = Collaborators {
        queue: store.clone(),
        groups: store.clone(),
        channels: chat,
        contacts: store,
        notifier: mail,
    };
    RunCoordinator::new(Matcher::default(), collaborators, fast_retry())
}

#[tokio::test]
async fn test_run_finalizes_emitted_groups() {
    let store = Arc::new(FakeStore::with_queue(scenario()));
    let chat = Arc::new(FakeChat::default());
    let mail = Arc::new(FakeMail::default());
    let coordinator = coordinator(store.clone(), chat.clone(), mail.clone());

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.run_id, 1);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.users_matched, 2);
    assert_eq!(summary.groups_emitted, 1);
    assert_eq!(summary.groups_persisted, 1);
    assert_eq!(summary.groups_excluded, 1);
    assert_eq!(summary.exclusions[0].member_ids, vec!["U3"]);

    let group = &summary.groups[0];
    assert_eq!(group.group_name, "A group");
    assert_eq!(group.host_id.as_deref(), Some("U1"));
    assert!(group.channel.is_success());
    assert!(group.queue_removal.is_success());
    assert!(group
        .notifications
        .iter()
        .all(|n| n.status == DeliveryStatus::Sent));

    let channels = chat.channels.lock().unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].0, group.group_id.to_string());
    assert_eq!(channels[0].2, vec!["U1", "U2"]);

    let mut sent = mail.sent.lock().unwrap().clone();
    sent.sort();
    assert_eq!(sent, vec!["u1@example.com", "u2@example.com"]);

    // the excluded user waits for the next run
    assert_eq!(store.queued_ids(), vec!["U3"]);
    assert_eq!(coordinator.last_summary().await.unwrap().run_id, 1);
}

#[tokio::test]
async fn test_persist_failure_keeps_members_queued() {
    let mut records = scenario();
    let mut trusted_a = create_test_record("T1", 30, (25, 35), "C", (2, 4), true);
    let mut trusted_b = create_test_record("T2", 31, (25, 35), "C", (2, 4), false);
    trusted_a.is_trusted = true;
    trusted_b.is_trusted = true;
    records.push(trusted_a);
    records.push(trusted_b);

    let store = Arc::new(FakeStore {
        fail_persist_for: Some("U1".to_string()),
        ..FakeStore::with_queue(records)
    });
    let chat = Arc::new(FakeChat::default());
    let mail = Arc::new(FakeMail::default());
    let coordinator = coordinator(store.clone(), chat.clone(), mail.clone());

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.groups_emitted, 2);
    assert_eq!(summary.groups_persisted, 1);

    let failed = summary
        .groups
        .iter()
        .find(|g| g.member_ids.contains(&"U1".to_string()))
        .unwrap();
    assert!(matches!(failed.persisted, StepOutcome::Failed { attempts: 2, .. }));
    assert_eq!(failed.channel, StepOutcome::Skipped);
    assert_eq!(failed.queue_removal, StepOutcome::Skipped);
    assert!(failed
        .notifications
        .iter()
        .all(|n| n.status == DeliveryStatus::Skipped));

    // only the trusted group went through
    assert_eq!(chat.channels.lock().unwrap().len(), 1);
    assert_eq!(mail.sent.lock().unwrap().len(), 2);
    assert_eq!(store.queued_ids(), vec!["U1", "U2", "U3"]);
}

#[tokio::test]
async fn test_missing_address_is_recorded() {
    let mut store = FakeStore::with_queue(scenario());
    store.emails.remove("U2");
    let store = Arc::new(store);
    let mail = Arc::new(FakeMail::default());
    let coordinator = coordinator(store, Arc::new(FakeChat::default()), mail.clone());

    let summary = coordinator.run().await.unwrap();
    let statuses: Vec<&DeliveryStatus> =
        summary.groups[0].notifications.iter().map(|n| &n.status).collect();

    assert_eq!(statuses, vec![&DeliveryStatus::Sent, &DeliveryStatus::NoAddress]);
    assert_eq!(mail.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_queue_failure_aborts_run() {
    let store = Arc::new(FakeStore {
        fail_snapshot: true,
        ..FakeStore::with_queue(scenario())
    });
    let chat = Arc::new(FakeChat::default());
    let coordinator = coordinator(store.clone(), chat.clone(), Arc::new(FakeMail::default()));

    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(err, RunError::QueueSource(_)));
    assert!(store.persisted.lock().unwrap().is_empty());
    assert!(chat.channels.lock().unwrap().is_empty());
    assert!(coordinator.last_summary().await.is_none());
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_overlapping_run_is_refused() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(FakeStore {
        hold_snapshot: Some(gate.clone()),
        ..FakeStore::with_queue(scenario())
    });
    let coordinator = Arc::new(coordinator(
        store,
        Arc::new(FakeChat::default()),
        Arc::new(FakeMail::default()),
    ));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run().await })
    };
    while !coordinator.is_running() {
        tokio::task::yield_now().await;
    }

    let refused = coordinator.run().await.unwrap_err();
    assert!(matches!(refused, RunError::AlreadyRunning { active_run_id: 1 }));

    gate.notify_one();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.run_id, 1);
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_abandoned_caller_still_clears_queue() {
    let store = Arc::new(FakeStore {
        remove_delay: Some(Duration::from_millis(100)),
        ..FakeStore::with_queue(scenario())
    });
    let coordinator = Arc::new(coordinator(
        store.clone(),
        Arc::new(FakeChat::default()),
        Arc::new(FakeMail::default()),
    ));

    // the caller gives up while the queue removal is still pending
    let waited = tokio::time::timeout(Duration::from_millis(20), coordinator.clone().trigger()).await;
    assert!(waited.is_err());
    assert_eq!(store.persisted.lock().unwrap().len(), 1);

    while coordinator.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(store.queued_ids(), vec!["U3"]);
    assert_eq!(coordinator.last_summary().await.unwrap().run_id, 1);

    let summary = coordinator.clone().trigger().await.unwrap();
    assert_eq!(summary.run_id, 2);
    assert_eq!(summary.groups_emitted, 0);
    assert_eq!(store.persisted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_notification_fan_out_respects_limits() {
    let mut records = scenario();
    for (id, age, is_host) in [("C1", 30, true), ("C2", 31, false)] {
        let mut trusted = create_test_record(id, age, (25, 35), "C", (2, 4), is_host);
        trusted.is_trusted = true;
        records.push(trusted);
    }

    let store = Arc::new(FakeStore::with_queue(records));
    let mail = Arc::new(FakeMail {
        delay: Some(Duration::from_millis(10)),
        ..FakeMail::default()
    });
    let coordinator = coordinator(store.clone(), Arc::new(FakeChat::default()), mail.clone())
        .with_limits(RunLimits {
            groups: 1,
            notifications: 1,
        });

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.groups_emitted, 2);
    assert_eq!(mail.sent.lock().unwrap().len(), 4);
    assert_eq!(mail.peak.load(Ordering::SeqCst), 1);
    assert_eq!(store.queued_ids(), vec!["U3"]);
}
