use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Terminal failure marker on a record. Absence means the record has not
/// been attempted yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Failed,
}

/// A record as dequeued for processing: only the fields the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Uuid,
    pub uri: Option<String>,
}

/// A full stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: Uuid,
    pub uri: Option<String>,
    pub description: Option<String>,
    pub status: Option<RecordStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// A record is eligible while it has neither a description nor a failure marker.
    pub fn is_eligible(&self) -> bool {
        self.description.is_none() && self.status != Some(RecordStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn stored(description: Option<&str>, status: Option<RecordStatus>) -> StoredRecord {
        StoredRecord {
            id: Uuid::new_v4(),
            uri: Some("https://example.com/meta.json".to_string()),
            description: description.map(str::to_string),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_wire_name() {
        assert_eq!(RecordStatus::Failed.to_string(), "failed");
        assert_eq!(RecordStatus::from_str("failed").unwrap(), RecordStatus::Failed);
        assert!(RecordStatus::from_str("success").is_err());
    }

    #[test]
    fn test_eligibility() {
        assert!(stored(None, None).is_eligible());
        assert!(!stored(Some("a cat"), None).is_eligible());
        assert!(!stored(None, Some(RecordStatus::Failed)).is_eligible());
    }
}
