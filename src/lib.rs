//! Haven Algo - Scheduled group matchmaking service for Grouphaven
//!
//! This library provides the grouping pipeline that turns the pending
//! match-preference queue into small hosted groups, and the run coordinator
//! that persists each group, opens its chat channel and notifies its members.

pub mod config;
pub mod coordinator;
pub mod core;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;

// Re-export commonly used types
pub use coordinator::{Collaborators, RunCoordinator, RunError, RunLimits};
pub use core::{calculate_compatibility, Group, MatchResult, Matcher};
pub use models::{BucketKey, MatchingPolicy, PreferenceRecord, RunSummary, ScoringWeights};
