use crate::core::{group::Group, scoring::calculate_compatibility};
use crate::models::ScoringWeights;
use serde::{Deserialize, Serialize};

/// Why a clustered group is kept out of persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Nobody else joined this user.
    Singleton,
    /// The group ended up without any host.
    NoHost,
}

/// Groups of one bucket after host rebalancing
#[derive(Debug, Clone, Default)]
pub struct RebalanceOutcome {
    pub emitted: Vec<Group>,
    pub excluded: Vec<(Group, ExclusionReason)>,
    pub hosts_moved: usize,
    pub hosts_demoted: usize,
}

/// Emission rule: drop ungrouped singletons and zero-host groups from persistence.
///
/// Whether dropping these is intended policy or an accident of the original
/// filter is still open; the behaviour is kept as observed.
pub fn exclusion_reason(group: &Group) -> Option<ExclusionReason> {
    if group.len() <= 1 {
        Some(ExclusionReason::Singleton)
    } else if !group.has_host() {
        Some(ExclusionReason::NoHost)
    } else {
        None
    }
}

/// Rebalance hosts across one bucket's groups, then split them into emitted and excluded
pub fn rebalance_hosts(mut groups: Vec<Group>, weights: &ScoringWeights, threshold: f64) -> RebalanceOutcome {
    let hosts_moved = redistribute_hosts(&mut groups, weights, threshold);
    let mut outcome = cap_hosts(groups);
    outcome.hosts_moved = hosts_moved;
    outcome
}

/// Pass A: move surplus hosts into hostless groups they are compatible with.
///
/// Each surplus host (every host after a group's first) is scored against the
/// remaining hostless groups in order and moves to the first one meeting the
/// threshold. A group that receives a host is no longer a candidate. Hosts that
/// fit nowhere stay put. Returns the number of hosts moved.
pub fn redistribute_hosts(groups: &mut [Group], weights: &ScoringWeights, threshold: f64) -> usize {
    let mut candidates: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| !g.has_host())
        .map(|(i, _)| i)
        .collect();

    let surplus: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.host_count() >= 2)
        .map(|(i, _)| i)
        .collect();

    let mut moved = 0;

    for source in surplus {
        let extra_hosts: Vec<String> = groups[source].host_ids().into_iter().skip(1).collect();

        for host_id in extra_hosts {
            if candidates.is_empty() {
                return moved;
            }

            let Some(host) = groups[source]
                .members()
                .iter()
                .find(|m| m.user_id == host_id)
                .cloned()
            else {
                continue;
            };

            let target = candidates
                .iter()
                .position(|&c| calculate_compatibility(&host, &groups[c], weights) >= threshold);

            if let Some(position) = target {
                let destination = candidates.remove(position);
                if let Some(member) = groups[source].take_member(&host_id) {
                    groups[destination].admit(member);
                    moved += 1;
                    tracing::debug!(
                        "Moved host {} from group {} to hostless group {}",
                        host_id,
                        source,
                        destination
                    );
                }
            }
        }
    }

    moved
}

/// Pass B: keep one host per emittable group and set the rest aside.
pub fn cap_hosts(groups: Vec<Group>) -> RebalanceOutcome {
    let mut outcome = RebalanceOutcome::default();

    for mut group in groups {
        match exclusion_reason(&group) {
            None => {
                outcome.hosts_demoted += group.demote_extra_hosts();
                outcome.emitted.push(group);
            }
            Some(reason) => outcome.excluded.push((group, reason)),
        }
    }

    outcome
}
