//! Synthetic record types.
//!
//! A `Record` is what the harness writes to, and reads back from, the target
//! store. Records are generated from `RecordTemplate`s: a template fixes the
//! category and data text and bounds the numeric value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordKey;

/// A synthetic record written to the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique access key.
    pub id: RecordKey,
    /// Category drawn from the template.
    pub category: String,
    /// Free-form data drawn from the template.
    pub data: String,
    /// Wall-clock creation time.
    pub timestamp: DateTime<Utc>,
    /// Numeric value drawn uniformly from the template's range.
    pub value: i64,
}

impl Record {
    /// Returns the record's access key.
    #[must_use]
    pub const fn key(&self) -> RecordKey {
        self.id
    }
}

/// Template for synthetic records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTemplate {
    /// Data text copied into generated records.
    pub name: String,
    /// Category copied into generated records.
    pub category: String,
    /// Lower bound of the value range (inclusive).
    pub min_value: i64,
    /// Upper bound of the value range (inclusive).
    pub max_value: i64,
}

impl RecordTemplate {
    /// Creates a new template.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        min_value: i64,
        max_value: i64,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            min_value,
            max_value,
        }
    }
}

/// Built-in template pool used when no templates are configured.
#[must_use]
pub fn default_templates() -> Vec<RecordTemplate> {
    vec![
        RecordTemplate::new("Alice", "Engineering", 75_000, 120_000),
        RecordTemplate::new("Bob", "HR", 45_000, 80_000),
        RecordTemplate::new("Charlie", "Finance", 60_000, 100_000),
        RecordTemplate::new("Diana", "Sales", 50_000, 95_000),
        RecordTemplate::new("Eve", "Legal", 70_000, 110_000),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_have_valid_ranges() {
        let templates = default_templates();
        assert_eq!(templates.len(), 5);
        for t in &templates {
            assert!(t.min_value <= t.max_value, "bad range in {t:?}");
        }
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record {
            id: RecordKey::from_uuid(uuid::Uuid::nil()),
            category: "HR".to_string(),
            data: "Bob".to_string(),
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            value: 50_000,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["category"], "HR");
        assert_eq!(json["value"], 50_000);
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
    }
}
