use crate::models::domain::{Gender, PreferenceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

/// A raw queue row as read from the store, before it becomes a `PreferenceRecord`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_ranges"))]
pub struct QueueEntry {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub gender: Option<String>,
    pub is_trusted: bool,
    pub same_gender_only: bool,
    #[validate(range(min = 0))]
    pub age: i32,
    #[validate(range(min = 0))]
    pub min_age: i32,
    #[validate(range(min = 0))]
    pub max_age: i32,
    pub city: Option<String>,
    pub is_host: bool,
    #[validate(range(min = 1))]
    pub min_group_size: i32,
    #[validate(range(min = 1))]
    pub max_group_size: i32,
    pub interests: Option<Vec<String>>,
}

fn validate_ranges(entry: &QueueEntry) -> Result<(), ValidationError> {
    if entry.min_age > entry.max_age {
        return Err(ValidationError::new("age_range"));
    }
    if entry.min_group_size > entry.max_group_size {
        return Err(ValidationError::new("group_size_range"));
    }
    Ok(())
}

impl From<QueueEntry> for PreferenceRecord {
    fn from(entry: QueueEntry) -> Self {
        let gender = entry
            .gender
            .as_deref()
            .and_then(|g| g.parse().ok())
            .unwrap_or(Gender::Other);

        let interests: BTreeSet<String> = entry
            .interests
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();

        PreferenceRecord {
            user_id: entry.user_id,
            gender,
            is_trusted: entry.is_trusted,
            same_gender_only: entry.same_gender_only,
            age: entry.age,
            min_age_pref: entry.min_age,
            max_age_pref: entry.max_age,
            city: entry.city.unwrap_or_default(),
            is_host: entry.is_host,
            min_group_size: entry.min_group_size,
            max_group_size: entry.max_group_size,
            interests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> QueueEntry {
        QueueEntry {
            user_id: "u1".to_string(),
            gender: Some("female".to_string()),
            is_trusted: true,
            same_gender_only: false,
            age: 27,
            min_age: 21,
            max_age: 35,
            city: Some("Kuala Lumpur".to_string()),
            is_host: false,
            min_group_size: 3,
            max_group_size: 5,
            interests: Some(vec!["hiking".to_string(), " ".to_string(), "chess".to_string()]),
        }
    }

    #[test]
    fn test_valid_entry_converts() {
        let entry = entry();
        assert!(entry.validate().is_ok());

        let record = PreferenceRecord::from(entry);
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.min_age_pref, 21);
        assert_eq!(record.interests.len(), 2);
    }

    #[test]
    fn test_inverted_age_range_rejected() {
        let mut entry = entry();
        entry.min_age = 40;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_negative_age_preference_rejected() {
        let mut entry = entry();
        entry.min_age = -3;
        assert!(entry.validate().is_err());

        let mut entry = self::entry();
        entry.min_age = -10;
        entry.max_age = -1;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let mut entry = entry();
        entry.user_id = String::new();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let mut entry = entry();
        entry.gender = None;
        entry.city = None;
        entry.interests = None;

        let record = PreferenceRecord::from(entry);
        assert_eq!(record.gender, Gender::Other);
        assert_eq!(record.city, "");
        assert!(record.interests.is_empty());
    }
}
