// Model exports
pub mod domain;
pub mod records;
pub mod responses;

pub use domain::{
    BucketKey, Gender, GenderBucket, GroupProfile, MatchingPolicy, PlacementPolicy, PreferenceRecord,
    ScoringWeights, TrustTier,
};
pub use records::QueueEntry;
pub use responses::{
    DeliveryStatus, ErrorResponse, ExclusionSummary, GroupOutcome, HealthResponse, NotificationOutcome,
    RunSummary, StepOutcome,
};
