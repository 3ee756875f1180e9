use crate::models::{GroupProfile, PreferenceRecord};
use std::collections::BTreeSet;

/// A group under construction during a run.
///
/// Members keep their insertion order, which decides which host survives
/// rebalancing. The profile is recomputed from scratch after every membership
/// change, so it never lags behind the member list. A group is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    members: Vec<PreferenceRecord>,
    profile: GroupProfile,
}

impl Group {
    /// Open a new group around a single user
    pub fn seed(user: PreferenceRecord) -> Self {
        let members = vec![user];
        let profile = profile_of(&members);
        Self { members, profile }
    }

    /// Append a member and refresh the profile
    pub fn admit(&mut self, user: PreferenceRecord) {
        self.members.push(user);
        self.profile = profile_of(&self.members);
    }

    /// Remove a member by id and refresh the profile.
    ///
    /// Returns `None` if the user is not a member or is the last member.
    pub fn take_member(&mut self, user_id: &str) -> Option<PreferenceRecord> {
        if self.members.len() <= 1 {
            return None;
        }
        let index = self.members.iter().position(|m| m.user_id == user_id)?;
        let member = self.members.remove(index);
        self.profile = profile_of(&self.members);
        Some(member)
    }

    pub fn members(&self) -> &[PreferenceRecord] {
        &self.members
    }

    pub fn profile(&self) -> &GroupProfile {
        &self.profile
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.user_id.clone()).collect()
    }

    /// Host ids in insertion order
    pub fn host_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.is_host)
            .map(|m| m.user_id.clone())
            .collect()
    }

    pub fn host_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_host).count()
    }

    pub fn has_host(&self) -> bool {
        self.members.iter().any(|m| m.is_host)
    }

    /// The earliest host by insertion order
    pub fn host(&self) -> Option<&PreferenceRecord> {
        self.members.iter().find(|m| m.is_host)
    }

    /// Clear the host flag on every host after the first. Returns how many were demoted.
    pub fn demote_extra_hosts(&mut self) -> usize {
        let mut seen_host = false;
        let mut demoted = 0;
        for member in self.members.iter_mut().filter(|m| m.is_host) {
            if seen_host {
                member.is_host = false;
                demoted += 1;
            } else {
                seen_host = true;
            }
        }
        demoted
    }
}

/// Derive a group profile from its members.
///
/// Ranges and sizes are rounded means of the members' preferences, the city is
/// the most frequent one, and interests are the plain union.
pub fn profile_of(members: &[PreferenceRecord]) -> GroupProfile {
    GroupProfile {
        min_age: rounded_mean(members.iter().map(|m| m.min_age_pref)),
        max_age: rounded_mean(members.iter().map(|m| m.max_age_pref)),
        min_group_size: rounded_mean(members.iter().map(|m| m.min_group_size)),
        max_group_size: rounded_mean(members.iter().map(|m| m.max_group_size)),
        city: dominant_city(members),
        interests: interest_union(members),
    }
}

/// Rounded arithmetic mean, half away from zero. Zero for an empty input.
pub fn rounded_mean(values: impl Iterator<Item = i32>) -> i32 {
    let (sum, count) = values.fold((0i64, 0i64), |(sum, count), v| (sum + v as i64, count + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as i32
}

/// Most frequent city among members.
///
/// Ties go to the city seen first in member order. That tie-break falls out of
/// the scan order rather than any rule about cities.
pub fn dominant_city(members: &[PreferenceRecord]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for member in members {
        match counts.iter_mut().find(|(city, _)| *city == member.city) {
            Some((_, count)) => *count += 1,
            None => counts.push((member.city.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (city, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((city, count));
        }
    }

    best.map(|(city, _)| city.to_string()).unwrap_or_default()
}

pub fn interest_union(members: &[PreferenceRecord]) -> BTreeSet<String> {
    members
        .iter()
        .flat_map(|m| m.interests.iter().cloned())
        .collect()
}
