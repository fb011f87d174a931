use logship::models::{EventAction, EventGroup, LogEvent};
use logship::store::{EventLogStore, LogQueue};
use speculate2::speculate;

fn test_event(group: &str, action: &str) -> LogEvent {
    LogEvent::new(
        "session-1",
        "-1",
        EventGroup::new(group, "1"),
        EventAction::new(action),
    )
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
    }

    describe "recording" {
        it "keeps recorded events out of the pending queue" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");

            store.record(&test_event("lifecycle", "started")).expect("Failed to record");

            assert!(store.pending().expect("Failed to list pending").is_empty());
        }

        it "rotates the active log into the queue" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("lifecycle", "started")).expect("Failed to record");

            let name = store.rotate().expect("Failed to rotate").expect("Nothing was rotated");

            let pending = store.pending().expect("Failed to list pending");
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].name, name);
        }

        it "does not rotate an empty active log" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");

            assert!(store.rotate().expect("Failed to rotate").is_none());
            assert!(store.pending().expect("Failed to list pending").is_empty());
        }

        it "rotates by itself once the active log reaches the size cap" {
            let store = EventLogStore::with_max_bytes(dir.path(), 64).expect("Failed to open store");

            store.record(&test_event("lifecycle", "started")).expect("Failed to record");
            store.record(&test_event("lifecycle", "stopped")).expect("Failed to record");

            assert_eq!(store.pending().expect("Failed to list pending").len(), 1);
        }

        it "queues a leftover active log when reopened" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("lifecycle", "started")).expect("Failed to record");
            drop(store);

            let reopened = EventLogStore::open(dir.path()).expect("Failed to reopen store");

            assert_eq!(reopened.pending().expect("Failed to list pending").len(), 1);
        }
    }

    describe "reading" {
        it "returns events in recorded order" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("lifecycle", "opened")).expect("Failed to record");
            store.record(&test_event("lifecycle", "closed")).expect("Failed to record");
            store.rotate().expect("Failed to rotate");

            let pending = store.pending().expect("Failed to list pending");
            let events = store.read(&pending[0]).expect("Failed to read log");

            assert_eq!(events.len(), 2);
            assert_eq!(events[0].event.id, "opened");
            assert_eq!(events[1].event.id, "closed");
        }

        it "merges consecutive identical events into one line with a summed count" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("actions", "invoked")).expect("Failed to record");
            store.record(&test_event("actions", "invoked")).expect("Failed to record");
            store.record(&test_event("actions", "invoked")).expect("Failed to record");
            store.rotate().expect("Failed to rotate");

            let pending = store.pending().expect("Failed to list pending");
            let events = store.read(&pending[0]).expect("Failed to read log");

            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event.count, 3);
        }

        it "skips unparseable lines" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            let line = serde_json::to_string(&test_event("lifecycle", "started"))
                .expect("Failed to serialize event");
            std::fs::write(
                dir.path().join("events-1000-abcd1234.log"),
                format!("not json\n{}\n", line),
            )
            .expect("Failed to write log file");

            let pending = store.pending().expect("Failed to list pending");
            let events = store.read(&pending[0]).expect("Failed to read log");

            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event.id, "started");
        }

        it "reads a fully corrupt file as empty" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            std::fs::write(dir.path().join("events-1000-abcd1234.log"), "garbage\nmore garbage\n")
                .expect("Failed to write log file");

            let pending = store.pending().expect("Failed to list pending");
            let events = store.read(&pending[0]).expect("Failed to read log");

            assert!(events.is_empty());
        }

        it "lists pending logs oldest first" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            std::fs::write(dir.path().join("events-2000-bbbbbbbb.log"), "")
                .expect("Failed to write log file");
            std::fs::write(dir.path().join("events-1000-aaaaaaaa.log"), "")
                .expect("Failed to write log file");

            let pending = store.pending().expect("Failed to list pending");

            assert_eq!(pending.len(), 2);
            assert_eq!(pending[0].name, "events-1000-aaaaaaaa.log");
            assert_eq!(pending[1].name, "events-2000-bbbbbbbb.log");
        }

        it "ignores files that are not rotated logs" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("lifecycle", "started")).expect("Failed to record");
            std::fs::write(dir.path().join("notes.txt"), "unrelated")
                .expect("Failed to write file");

            assert!(store.pending().expect("Failed to list pending").is_empty());
        }
    }

    describe "removal" {
        it "removes a shipped log from the queue" {
            let store = EventLogStore::open(dir.path()).expect("Failed to open store");
            store.record(&test_event("lifecycle", "started")).expect("Failed to record");
            store.rotate().expect("Failed to rotate");

            let pending = store.pending().expect("Failed to list pending");
            store.remove(&pending[0]).expect("Failed to remove log");

            assert!(store.pending().expect("Failed to list pending").is_empty());
        }
    }
}
