use crate::core::group::Group;
use crate::models::{PreferenceRecord, ScoringWeights};

/// Per-criterion scores, each in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubScores {
    pub age_fit: f64,
    pub age_overlap: f64,
    pub city: f64,
    pub group_size: f64,
    pub interests: f64,
}

impl SubScores {
    /// Weighted total on the 0-100 scale, rounded to two decimals
    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        let raw = (self.age_fit * weights.age_fit
            + self.age_overlap * weights.age_overlap
            + self.city * weights.city
            + self.group_size * weights.group_size
            + self.interests * weights.interests)
            * 100.0;

        round_to_hundredths(raw).clamp(0.0, 100.0)
    }
}

/// Calculate how well a user fits a group (0-100)
///
/// Scoring formula:
/// score = (
///     age_fit * 0.20 +        # user's age inside the group's range
///     age_overlap * 0.20 +    # user's preferred range covers / overlaps the group's
///     city * 0.10 +           # same city as the group
///     group_size * 0.25 +     # group size after joining fits the user's bounds
///     interests * 0.25        # Dice overlap of interests
/// )
pub fn calculate_compatibility(
    user: &PreferenceRecord,
    group: &Group,
    weights: &ScoringWeights,
) -> f64 {
    sub_scores(user, group).weighted(weights)
}

pub fn sub_scores(user: &PreferenceRecord, group: &Group) -> SubScores {
    let profile = group.profile();

    SubScores {
        age_fit: calculate_age_fit(user.age, profile.min_age, profile.max_age),
        age_overlap: calculate_age_overlap(
            user.min_age_pref,
            user.max_age_pref,
            profile.min_age,
            profile.max_age,
        ),
        city: if profile.city == user.city { 1.0 } else { 0.0 },
        group_size: calculate_size_fit(group.len(), user.min_group_size, user.max_group_size),
        interests: dice_coefficient(&user.interests, &profile.interests),
    }
}

#[inline]
fn calculate_age_fit(age: i32, group_min: i32, group_max: i32) -> f64 {
    if age >= group_min && age <= group_max {
        1.0
    } else {
        0.0
    }
}

#[inline]
fn calculate_age_overlap(pref_min: i32, pref_max: i32, group_min: i32, group_max: i32) -> f64 {
    if pref_min <= group_min && pref_max >= group_max {
        1.0
    } else if pref_max >= group_min && pref_min <= group_max {
        0.5
    } else {
        0.0
    }
}

/// Fit of the size the group would have once the user joins
#[inline]
fn calculate_size_fit(current_size: usize, min_size: i32, max_size: i32) -> f64 {
    let projected = current_size as i64 + 1;
    if projected > max_size as i64 {
        0.0
    } else if projected >= min_size as i64 {
        1.0
    } else {
        0.5
    }
}

/// Dice coefficient `2|A∩B| / (|A|+|B|)`. An empty side counts as a full match.
pub fn dice_coefficient<T: Ord>(
    a: &std::collections::BTreeSet<T>,
    b: &std::collections::BTreeSet<T>,
) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    2.0 * shared / (a.len() + b.len()) as f64
}

#[inline]
fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
