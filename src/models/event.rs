use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single recorded usage event.
///
/// Stored as one JSON object per line in the active log and shipped inside
/// [`EventBatch`](super::EventBatch) blocks. `count` collapses runs of
/// identical events into a single line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Identifier of the recording session, one per recorder process.
    pub session: String,
    /// Rollout bucket of this installation, `-1` when unassigned.
    pub bucket: String,
    /// Epoch milliseconds at which the event was recorded.
    pub time: i64,
    pub group: EventGroup,
    pub event: EventAction,
}

/// The schema an event belongs to: a group id plus the version of its
/// validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    pub id: String,
    pub version: String,
}

/// What happened: an event id plus optional structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAction {
    pub id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl LogEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        session: impl Into<String>,
        bucket: impl Into<String>,
        group: EventGroup,
        event: EventAction,
    ) -> Self {
        Self {
            session: session.into(),
            bucket: bucket.into(),
            time: Utc::now().timestamp_millis(),
            group,
            event,
        }
    }

    /// True when the two events differ only by time and count, so they can
    /// collapse into one line with a summed count.
    pub fn mergeable_with(&self, other: &Self) -> bool {
        self.session == other.session
            && self.bucket == other.bucket
            && self.group == other.group
            && self.event.id == other.event.id
            && self.event.data == other.event.data
    }
}

impl EventGroup {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl EventAction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Map::new(),
            count: 1,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Collapse runs of consecutive mergeable events, summing their counts. The
/// first event of each run keeps its timestamp. Counts saturate at
/// `u32::MAX` rather than wrapping.
pub fn merge_consecutive(events: Vec<LogEvent>) -> Vec<LogEvent> {
    let mut merged: Vec<LogEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if last.mergeable_with(&event) => {
                last.event.count = last.event.count.saturating_add(event.event.count)
            }
            _ => merged.push(event),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(time: i64, group: &str, action: &str) -> LogEvent {
        LogEvent {
            session: "session-1".to_string(),
            bucket: "-1".to_string(),
            time,
            group: EventGroup::new(group, "1"),
            event: EventAction::new(action),
        }
    }

    #[test]
    fn merges_consecutive_duplicates_and_sums_counts() {
        let events = vec![
            event_at(1, "lifecycle", "opened"),
            event_at(2, "lifecycle", "opened"),
            event_at(3, "lifecycle", "opened"),
        ];

        let merged = merge_consecutive(events);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].event.count, 3);
        assert_eq!(merged[0].time, 1);
    }

    #[test]
    fn does_not_merge_across_different_events() {
        let events = vec![
            event_at(1, "lifecycle", "opened"),
            event_at(2, "lifecycle", "closed"),
            event_at(3, "lifecycle", "opened"),
        ];

        assert_eq!(merge_consecutive(events).len(), 3);
    }

    #[test]
    fn merging_saturates_the_count_instead_of_overflowing() {
        let mut first = event_at(1, "actions", "invoked");
        first.event.count = u32::MAX;
        let mut second = event_at(2, "actions", "invoked");
        second.event.count = 2;

        let merged = merge_consecutive(vec![first, second]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].event.count, u32::MAX);
    }

    #[test]
    fn does_not_merge_when_payload_differs() {
        let plain = event_at(1, "actions", "invoked");
        let with_data = LogEvent {
            event: EventAction::new("invoked").with_data("place", Value::from("menu")),
            ..event_at(2, "actions", "invoked")
        };

        assert_eq!(merge_consecutive(vec![plain, with_data]).len(), 2);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let event = event_at(123, "lifecycle", "opened");
        let json = serde_json::to_value(&event).expect("Failed to serialize event");

        assert_eq!(json["time"], 123);
        assert_eq!(json["group"]["id"], "lifecycle");
        assert_eq!(json["group"]["version"], "1");
        assert_eq!(json["event"]["id"], "opened");
        assert_eq!(json["event"]["count"], 1);
    }

    #[test]
    fn missing_payload_and_count_get_defaults() {
        let line = r#"{"session":"s","bucket":"-1","time":1,"group":{"id":"g","version":"1"},"event":{"id":"e"}}"#;
        let event: LogEvent = serde_json::from_str(line).expect("Failed to parse event");

        assert!(event.event.data.is_empty());
        assert_eq!(event.event.count, 1);
    }
}
