use crate::SnapshotID;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a directory's state at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotID,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(id: SnapshotID, timestamp: DateTime<Utc>) -> Self {
        Self { id, timestamp }
    }

    /// Timestamp in local time, as shown to users.
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    pub fn summary(&self) -> String {
        format!("Snapshot {} taken at {}", self.id, self.display_time())
    }
}
