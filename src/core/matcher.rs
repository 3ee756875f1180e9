use crate::core::{
    clusterer::cluster_bucket,
    group::Group,
    partition::partition,
    rebalance::{rebalance_hosts, ExclusionReason},
};
use crate::models::{BucketKey, MatchingPolicy, PreferenceRecord, ScoringWeights};
use serde::{Deserialize, Serialize};

/// A group that survived rebalancing and should be persisted
#[derive(Debug, Clone)]
pub struct MatchedGroup {
    pub bucket: BucketKey,
    pub group: Group,
}

/// A clustered group that the emission rule kept out of persistence
#[derive(Debug, Clone)]
pub struct ExcludedGroup {
    pub bucket: BucketKey,
    pub reason: ExclusionReason,
    pub group: Group,
}

/// Per-bucket counters for one matching pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub bucket: BucketKey,
    pub users: usize,
    pub groups_formed: usize,
    pub emitted: usize,
    pub excluded: usize,
    pub hosts_moved: usize,
    pub hosts_demoted: usize,
}

/// Result of the matching process
#[derive(Debug)]
pub struct MatchResult {
    pub groups: Vec<MatchedGroup>,
    pub excluded: Vec<ExcludedGroup>,
    pub buckets: Vec<BucketStats>,
    pub total_users: usize,
}

impl MatchResult {
    pub fn matched_users(&self) -> usize {
        self.groups.iter().map(|g| g.group.len()).sum()
    }
}

/// Main matching orchestrator - runs the grouping pipeline over one queue snapshot
///
/// # Pipeline Stages
/// 1. Hard partitioning by trust tier and gender policy
/// 2. Greedy clustering per bucket
/// 3. Host redistribution and capping per bucket
///
/// The pipeline is pure and deterministic for a given input order.
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    policy: MatchingPolicy,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, policy: MatchingPolicy) -> Self {
        Self { weights, policy }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
            policy: MatchingPolicy::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    /// Group every user of the snapshot.
    ///
    /// # Arguments
    /// * `users` - Pending preference records, in queue order
    ///
    /// # Returns
    /// MatchResult containing emitted groups, excluded groups and per-bucket counters
    pub fn match_users(&self, users: Vec<PreferenceRecord>) -> MatchResult {
        let total_users = users.len();
        let partition = partition(users);

        let mut result = MatchResult {
            groups: Vec::new(),
            excluded: Vec::new(),
            buckets: Vec::with_capacity(BucketKey::ALL.len()),
            total_users,
        };

        for (bucket, members) in partition.into_buckets() {
            let users = members.len();
            let clustered = cluster_bucket(members, &self.weights, &self.policy);
            let groups_formed = clustered.len();
            let outcome = rebalance_hosts(clustered, &self.weights, self.policy.join_threshold);

            let stats = BucketStats {
                bucket,
                users,
                groups_formed,
                emitted: outcome.emitted.len(),
                excluded: outcome.excluded.len(),
                hosts_moved: outcome.hosts_moved,
                hosts_demoted: outcome.hosts_demoted,
            };

            if users > 0 {
                tracing::debug!(
                    "Bucket {}: {} users, {} groups formed, {} emitted, {} excluded",
                    bucket,
                    stats.users,
                    stats.groups_formed,
                    stats.emitted,
                    stats.excluded
                );
            }

            result
                .groups
                .extend(outcome.emitted.into_iter().map(|group| MatchedGroup { bucket, group }));
            result.excluded.extend(
                outcome
                    .excluded
                    .into_iter()
                    .map(|(group, reason)| ExcludedGroup { bucket, reason, group }),
            );
            result.buckets.push(stats);
        }

        result
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
