use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Gender as recorded on the user's profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl FromStr for Gender {
    type Err = std::convert::Infallible;

    /// Anything that is not recognisably male or female is `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Gender::Male,
            "female" | "f" => Gender::Female,
            _ => Gender::Other,
        })
    }
}

/// One waiting user's matching attributes, read from the preference queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub gender: Gender,
    #[serde(rename = "isTrusted")]
    pub is_trusted: bool,
    #[serde(rename = "sameGenderOnly")]
    pub same_gender_only: bool,
    pub age: i32,
    #[serde(rename = "minAgePref")]
    pub min_age_pref: i32,
    #[serde(rename = "maxAgePref")]
    pub max_age_pref: i32,
    pub city: String,
    #[serde(rename = "isHost")]
    pub is_host: bool,
    #[serde(rename = "minGroupSize")]
    pub min_group_size: i32,
    #[serde(rename = "maxGroupSize")]
    pub max_group_size: i32,
    #[serde(default)]
    pub interests: BTreeSet<String>,
}

/// Hard trust tier. Trusted users are only ever grouped with other trusted users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Trusted,
    NotTrusted,
}

/// Gender-matching bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderBucket {
    Male,
    Female,
    Mixed,
}

/// One of the six hard-partition cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub tier: TrustTier,
    pub gender: GenderBucket,
}

impl BucketKey {
    pub const ALL: [BucketKey; 6] = [
        BucketKey::new(TrustTier::Trusted, GenderBucket::Male),
        BucketKey::new(TrustTier::Trusted, GenderBucket::Female),
        BucketKey::new(TrustTier::Trusted, GenderBucket::Mixed),
        BucketKey::new(TrustTier::NotTrusted, GenderBucket::Male),
        BucketKey::new(TrustTier::NotTrusted, GenderBucket::Female),
        BucketKey::new(TrustTier::NotTrusted, GenderBucket::Mixed),
    ];

    pub const fn new(tier: TrustTier, gender: GenderBucket) -> Self {
        Self { tier, gender }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self.tier {
            TrustTier::Trusted => "trusted",
            TrustTier::NotTrusted => "not_trusted",
        };
        let gender = match self.gender {
            GenderBucket::Male => "male",
            GenderBucket::Female => "female",
            GenderBucket::Mixed => "mixed",
        };
        write!(f, "{}/{}", tier, gender)
    }
}

/// Aggregated preferences of a group, derived from its current members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    #[serde(rename = "minAge")]
    pub min_age: i32,
    #[serde(rename = "maxAge")]
    pub max_age: i32,
    #[serde(rename = "minGroupSize")]
    pub min_group_size: i32,
    #[serde(rename = "maxGroupSize")]
    pub max_group_size: i32,
    pub city: String,
    pub interests: BTreeSet<String>,
}

/// Scoring weights for the compatibility metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub age_fit: f64,
    pub age_overlap: f64,
    pub city: f64,
    pub group_size: f64,
    pub interests: f64,
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.age_fit + self.age_overlap + self.city + self.group_size + self.interests
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            age_fit: 0.20,
            age_overlap: 0.20,
            city: 0.10,
            group_size: 0.25,
            interests: 0.25,
        }
    }
}

/// How a user is placed among the open groups of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// Join the first open group, in creation order, that meets the threshold.
    #[default]
    FirstFit,
    /// Join the highest-scoring qualifying group; ties go to the earliest group.
    BestFit,
}

/// Grouping rules shared by the clusterer and the host rebalancer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingPolicy {
    pub join_threshold: f64,
    pub placement: PlacementPolicy,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            join_threshold: 80.0,
            placement: PlacementPolicy::FirstFit,
        }
    }
}
