//! Upload bookkeeping: device identity, last-shipped time, attempt history.
//!
//! The journal is deliberately small. It never sits on the upload path as a
//! gatekeeper; passes consult it for the device id and record their outcome
//! afterwards.

mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::{ResultCode, UploadSummary};

/// One recorded upload pass.
#[derive(Debug, Clone)]
pub struct UploadAttempt {
    pub code: ResultCode,
    pub message: String,
    pub total_files: usize,
    pub uploaded_files: usize,
    pub created_at: DateTime<Utc>,
}

pub struct UploadJournal {
    conn: Arc<Mutex<Connection>>,
}

impl UploadJournal {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Journal path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "logship")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let journal_path = dirs.data_dir().join("journal.db");
        Self::open(journal_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Identity operations
    // ============================================================

    /// Stable anonymous id of this installation, created on first use.
    pub fn device_id(&self) -> Result<String> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = 'device_id'")?;

        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(row.get(0)?);
        }
        drop(rows);
        drop(stmt);

        // Another process may create the id between the lookup and the
        // insert; read back whichever one landed first.
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('device_id', ?)",
            [Uuid::new_v4().to_string()],
        )?;
        let id = conn.query_row("SELECT value FROM meta WHERE key = 'device_id'", [], |row| {
            row.get(0)
        })?;
        Ok(id)
    }

    // ============================================================
    // Upload pass operations
    // ============================================================

    pub fn set_last_sent(&self, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('last_sent_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            [at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_sent(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        let mut stmt = conn.prepare("SELECT value FROM meta WHERE key = 'last_sent_at'")?;

        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(Some(parse_datetime(row.get::<_, String>(0)?)))
        } else {
            Ok(None)
        }
    }

    pub fn record_attempt(&self, summary: &UploadSummary) -> Result<()> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        conn.execute(
            "INSERT INTO upload_attempts (id, code, message, total_files, uploaded_files, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                summary.code.as_str(),
                &summary.message,
                summary.total as i64,
                summary.uploaded as i64,
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    pub fn recent_attempts(&self, limit: usize) -> Result<Vec<UploadAttempt>> {
        let conn = self.conn.lock().expect("journal lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT code, message, total_files, uploaded_files, created_at
             FROM upload_attempts ORDER BY created_at DESC LIMIT ?",
        )?;

        let attempts = stmt
            .query_map([limit as i64], |row| {
                Ok(UploadAttempt {
                    code: ResultCode::from_str(&row.get::<_, String>(0)?)
                        .unwrap_or(ResultCode::SentWithErrors),
                    message: row.get(1)?,
                    total_files: row.get::<_, i64>(2)? as usize,
                    uploaded_files: row.get::<_, i64>(3)? as usize,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(attempts)
    }
}

impl Clone for UploadJournal {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
