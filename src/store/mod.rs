//! Event recording and the pending-log queue.
//!
//! Events append to `active.log`, one JSON object per line. When the active
//! file reaches the size cap it is rotated to `events-<millis>-<suffix>.log`
//! and joins the pending queue. Only rotated files are ever shipped; the
//! active file is invisible to the queue.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{merge_consecutive, LogEvent};

/// Size cap for the active log before rotation.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 200 * 1024;

const ACTIVE_NAME: &str = "active.log";
const PENDING_PREFIX: &str = "events-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("log store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not determine a data directory for this platform")]
    NoDataDir,
}

/// A rotated log file waiting to be shipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLog {
    pub name: String,
}

/// The queue of event logs pending upload.
///
/// [`EventLogStore`] is the file-backed production implementation;
/// [`MemoryQueue`] backs tests.
pub trait LogQueue: Send + Sync {
    /// Logs waiting to be shipped, oldest first.
    fn pending(&self) -> Result<Vec<QueuedLog>, StoreError>;

    /// Parse the events of one queued log. Unparseable lines are skipped and
    /// consecutive duplicates are merged.
    fn read(&self, log: &QueuedLog) -> Result<Vec<LogEvent>, StoreError>;

    /// Drop a queued log after it was shipped or found invalid.
    fn remove(&self, log: &QueuedLog) -> Result<(), StoreError>;
}

/// File-backed event store: an append-only active log plus rotated files.
pub struct EventLogStore {
    dir: PathBuf,
    session: String,
    max_log_bytes: u64,
}

impl EventLogStore {
    /// Open a store in `dir`, creating it if needed. A leftover active file
    /// from an earlier process is rotated so its events become shippable.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_max_bytes(dir, DEFAULT_MAX_LOG_BYTES)
    }

    pub fn with_max_bytes(dir: impl Into<PathBuf>, max_log_bytes: u64) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            session: Uuid::new_v4().to_string(),
            max_log_bytes,
        };
        store.rotate()?;
        Ok(store)
    }

    /// Store under the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let dirs =
            directories::ProjectDirs::from("", "", "logship").ok_or(StoreError::NoDataDir)?;
        Self::open(dirs.data_dir().join("logs"))
    }

    /// Identifier of this recording session, stamped on recorded events.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Append one event to the active log, rotating first when the size cap
    /// has been reached.
    pub fn record(&self, event: &LogEvent) -> Result<(), StoreError> {
        let active = self.active_path();
        if let Ok(meta) = fs::metadata(&active) {
            if meta.len() >= self.max_log_bytes {
                self.rotate()?;
            }
        }

        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&active)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Move the active log into the pending queue. Returns the queued name,
    /// or `None` when there was nothing to rotate.
    pub fn rotate(&self) -> Result<Option<String>, StoreError> {
        let active = self.active_path();
        match fs::metadata(&active) {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Ok(None),
        }

        let suffix = Uuid::new_v4().to_string();
        let name = format!(
            "{}{}-{}.log",
            PENDING_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
        );
        fs::rename(&active, self.dir.join(&name))?;
        tracing::debug!("Rotated active log to {}", name);
        Ok(Some(name))
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(ACTIVE_NAME)
    }
}

impl LogQueue for EventLogStore {
    fn pending(&self) -> Result<Vec<QueuedLog>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PENDING_PREFIX) && name.ends_with(".log") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names.into_iter().map(|name| QueuedLog { name }).collect())
    }

    fn read(&self, log: &QueuedLog) -> Result<Vec<LogEvent>, StoreError> {
        let file = File::open(self.dir.join(&log.name))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(&line) {
                Ok(event) => events.push(event),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::trace!("Skipped {} unparseable lines in {}", skipped, log.name);
        }
        Ok(merge_consecutive(events))
    }

    fn remove(&self, log: &QueuedLog) -> Result<(), StoreError> {
        fs::remove_file(self.dir.join(&log.name))?;
        Ok(())
    }
}

/// In-memory queue for tests.
#[derive(Default)]
pub struct MemoryQueue {
    logs: std::sync::Mutex<Vec<(String, Vec<LogEvent>)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, name: impl Into<String>, events: Vec<LogEvent>) {
        self.logs
            .lock()
            .expect("queue lock poisoned")
            .push((name.into(), events));
    }
}

impl LogQueue for MemoryQueue {
    fn pending(&self) -> Result<Vec<QueuedLog>, StoreError> {
        let logs = self.logs.lock().expect("queue lock poisoned");
        Ok(logs
            .iter()
            .map(|(name, _)| QueuedLog { name: name.clone() })
            .collect())
    }

    fn read(&self, log: &QueuedLog) -> Result<Vec<LogEvent>, StoreError> {
        let logs = self.logs.lock().expect("queue lock poisoned");
        let events = logs
            .iter()
            .find(|(name, _)| *name == log.name)
            .map(|(_, events)| events.clone())
            .unwrap_or_default();
        Ok(merge_consecutive(events))
    }

    fn remove(&self, log: &QueuedLog) -> Result<(), StoreError> {
        let mut logs = self.logs.lock().expect("queue lock poisoned");
        logs.retain(|(name, _)| *name != log.name);
        Ok(())
    }
}
