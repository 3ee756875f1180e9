use crate::core::{group::Group, scoring::calculate_compatibility};
use crate::models::{MatchingPolicy, PlacementPolicy, PreferenceRecord, ScoringWeights};

/// Greedily cluster one bucket into groups.
///
/// Users are taken strictly in the given order. Each user joins an open group
/// chosen by the placement policy, or opens a new group at the end of the list.
/// The result depends on input order; it is not a global optimum.
pub fn cluster_bucket(
    users: Vec<PreferenceRecord>,
    weights: &ScoringWeights,
    policy: &MatchingPolicy,
) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for user in users {
        match select_group(&user, &groups, weights, policy) {
            Some(index) => {
                tracing::trace!("User {} joins group {}", user.user_id, index);
                groups[index].admit(user);
            }
            None => {
                tracing::trace!("User {} opens group {}", user.user_id, groups.len());
                groups.push(Group::seed(user));
            }
        }
    }

    groups
}

/// Index of the group the user should join, if any qualifies
pub fn select_group(
    user: &PreferenceRecord,
    groups: &[Group],
    weights: &ScoringWeights,
    policy: &MatchingPolicy,
) -> Option<usize> {
    let qualifying = groups.iter().enumerate().filter_map(|(index, group)| {
        let score = calculate_compatibility(user, group, weights);
        (score >= policy.join_threshold).then_some((index, score))
    });

    match policy.placement {
        PlacementPolicy::FirstFit => qualifying.map(|(index, _)| index).next(),
        PlacementPolicy::BestFit => {
            let mut best: Option<(usize, f64)> = None;
            for (index, score) in qualifying {
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((index, score));
                }
            }
            best.map(|(index, _)| index)
        }
    }
}
