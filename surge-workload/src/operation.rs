//! Completed-operation outcomes, as written to the result log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surge_core::{NodeId, Record, RecordKey, WorkerId};

/// Kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Write a new record.
    Write,
    /// Read a previously written record.
    Read,
}

impl OperationKind {
    /// Returns the kind name as written in the result log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Read => "read",
        }
    }
}

/// Operation-specific part of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OperationPayload {
    /// The generated record that was written.
    Write {
        /// Record submitted to the store.
        record: Record,
    },
    /// The key that was looked up and what came back.
    Read {
        /// Key that was looked up.
        key: RecordKey,
        /// Record returned by the store, absent when the read failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        returned: Option<Record>,
    },
}

impl OperationPayload {
    /// Returns the operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Write { .. } => OperationKind::Write,
            Self::Read { .. } => OperationKind::Read,
        }
    }
}

/// Outcome of one completed, post-warm-up operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Worker lane that issued the operation.
    pub worker_id: WorkerId,
    /// Store node the operation was routed to.
    pub node_id: NodeId,
    /// Wall-clock time at operation start.
    pub timestamp: DateTime<Utc>,
    /// Microseconds from run start to operation start.
    pub elapsed_us: u64,
    /// Operation latency in microseconds.
    pub duration_us: u64,
    /// Whether the store call succeeded.
    pub success: bool,
    /// Error text, present iff `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation-specific payload.
    #[serde(flatten)]
    pub payload: OperationPayload,
}

impl OperationRecord {
    /// Returns the operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record {
            id: RecordKey::from_uuid(uuid::Uuid::nil()),
            category: "Sales".to_string(),
            data: "Diana".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            value: 60_000,
        }
    }

    #[test]
    fn test_write_entry_shape() {
        let entry = OperationRecord {
            worker_id: WorkerId::new(3),
            node_id: NodeId::new(1),
            timestamp: DateTime::from_timestamp(1_700_000_001, 0).unwrap(),
            elapsed_us: 1_500,
            duration_us: 420,
            success: true,
            error: None,
            payload: OperationPayload::Write { record: record() },
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["worker_id"], 3);
        assert_eq!(json["node_id"], 1);
        assert_eq!(json["action"], "write");
        assert_eq!(json["success"], true);
        assert_eq!(json["duration_us"], 420);
        assert_eq!(json["record"]["data"], "Diana");
        assert!(json.get("error").is_none());
        assert!(json.get("key").is_none());
    }

    #[test]
    fn test_failed_read_entry_shape() {
        let entry = OperationRecord {
            worker_id: WorkerId::new(0),
            node_id: NodeId::new(2),
            timestamp: DateTime::from_timestamp(1_700_000_002, 0).unwrap(),
            elapsed_us: 9,
            duration_us: 10,
            success: false,
            error: Some("store unavailable: node down".to_string()),
            payload: OperationPayload::Read {
                key: record().key(),
                returned: None,
            },
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "read");
        assert_eq!(json["key"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["error"], "store unavailable: node down");
        assert!(json.get("returned").is_none());
        assert_eq!(entry.kind(), OperationKind::Read);
    }

    #[test]
    fn test_entry_parses_back() {
        let entry = OperationRecord {
            worker_id: WorkerId::new(5),
            node_id: NodeId::new(0),
            timestamp: DateTime::from_timestamp(1_700_000_003, 0).unwrap(),
            elapsed_us: 77,
            duration_us: 12,
            success: true,
            error: None,
            payload: OperationPayload::Read {
                key: record().key(),
                returned: Some(record()),
            },
        };

        let text = serde_json::to_string(&entry).unwrap();
        let parsed: OperationRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, entry);
    }
}
