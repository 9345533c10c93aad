//! Summary of one sync round

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidesync_merge::SyncResponse;

/// What a sync round did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Whether the round started without metadata
    pub initial: bool,
    /// New local files the server accepted
    pub uploaded: usize,
    /// Local changes the server accepted
    pub changes_pushed: usize,
    /// Local deletions the server accepted
    pub deletions_pushed: usize,
    /// Items added or changed on the server
    pub received: usize,
    /// Items deleted on the server
    pub removed_by_server: usize,
    /// Conflicts, all resolved in favour of the server
    pub conflicts: usize,
    /// Files recorded in the metadata after the round
    pub files_tracked: usize,
    /// Wall-clock time of the round
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl SyncReport {
    /// Report for a round that has not exchanged anything yet
    pub fn new(initial: bool) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    /// Count the outcomes of one server response
    pub fn record<C: Ord, S: Ord, A>(&mut self, response: &SyncResponse<C, S, A>) {
        self.uploaded += response.client_added.len();
        self.changes_pushed += response.client_changed.len();
        self.deletions_pushed += response.client_deleted.len();
        self.received += response.server_added.len() + response.server_changed.len();
        self.removed_by_server += response.server_deleted.len();
        self.conflicts += response.conflict_count();
    }

    /// Whether the round changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.uploaded == 0
            && self.changes_pushed == 0
            && self.deletions_pushed == 0
            && self.received == 0
            && self.removed_by_server == 0
            && self.conflicts == 0
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidesync_merge::{ClientAddition, Timed};
    use tidesync_types::ServerTime;

    #[test]
    fn test_record_accumulates() {
        let mut first: SyncResponse<u64, u64, String> = SyncResponse::empty();
        first
            .server_added
            .insert(1, Timed::new("a".to_string(), ServerTime::new(1)));
        first
            .server_added
            .insert(2, Timed::new("b".to_string(), ServerTime::new(2)));

        let mut second: SyncResponse<u64, u64, String> = SyncResponse::empty();
        second.client_added.insert(
            0,
            ClientAddition {
                id: 3,
                time: ServerTime::new(3),
            },
        );
        second.server_deleted.insert(2);
        second.conflicts_server_deleted.insert(4);

        let mut report = SyncReport::new(true);
        report.record(&first);
        report.record(&second);

        assert!(report.initial);
        assert_eq!(report.received, 2);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.removed_by_server, 1);
        assert_eq!(report.conflicts, 1);
        assert!(!report.is_noop());
    }

    #[test]
    fn test_empty_response_is_noop() {
        let mut report = SyncReport::new(false);
        report.record(&SyncResponse::<u64, u64, String>::empty());
        assert!(report.is_noop());
    }

    #[test]
    fn test_serializes_duration_as_millis() {
        let report = SyncReport {
            duration: Duration::from_millis(1500),
            ..SyncReport::default()
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1500);
    }
}
