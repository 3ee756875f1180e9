// Core algorithm exports
pub mod clusterer;
pub mod group;
pub mod matcher;
pub mod partition;
pub mod rebalance;
pub mod scoring;

pub use clusterer::{cluster_bucket, select_group};
pub use group::{profile_of, Group};
pub use matcher::{BucketStats, ExcludedGroup, MatchResult, MatchedGroup, Matcher};
pub use partition::{bucket_for, partition, Partition};
pub use rebalance::{exclusion_reason, rebalance_hosts, ExclusionReason, RebalanceOutcome};
pub use scoring::{calculate_compatibility, sub_scores, SubScores};
