use crate::models::{BucketKey, Gender, GenderBucket, PreferenceRecord, TrustTier};
use std::collections::BTreeMap;

/// The waiting set split into the six hard-constraint buckets.
///
/// Every bucket is present (possibly empty) and keeps the input order of its users.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    buckets: BTreeMap<BucketKey, Vec<PreferenceRecord>>,
}

impl Partition {
    pub fn bucket(&self, key: BucketKey) -> &[PreferenceRecord] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &Vec<PreferenceRecord>)> {
        self.buckets.iter()
    }

    pub fn total_users(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn into_buckets(self) -> impl Iterator<Item = (BucketKey, Vec<PreferenceRecord>)> {
        self.buckets.into_iter()
    }
}

/// Which bucket a user belongs to.
///
/// Only an explicit same-gender request by a male or female user leads to a
/// single-gender bucket. Everyone else is mixed.
#[inline]
pub fn bucket_for(user: &PreferenceRecord) -> BucketKey {
    let tier = if user.is_trusted {
        TrustTier::Trusted
    } else {
        TrustTier::NotTrusted
    };

    let gender = match (user.same_gender_only, user.gender) {
        (true, Gender::Male) => GenderBucket::Male,
        (true, Gender::Female) => GenderBucket::Female,
        _ => GenderBucket::Mixed,
    };

    BucketKey::new(tier, gender)
}

/// Split users into disjoint buckets by trust tier and gender policy
pub fn partition(users: Vec<PreferenceRecord>) -> Partition {
    let mut buckets: BTreeMap<BucketKey, Vec<PreferenceRecord>> =
        BucketKey::ALL.iter().map(|key| (*key, Vec::new())).collect();

    for user in users {
        buckets.entry(bucket_for(&user)).or_default().push(user);
    }

    Partition { buckets }
}
