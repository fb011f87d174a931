//! The upload pass: read queued logs, post their blocks, clean up, classify.

mod client;

pub use client::{ClientError, StatClient};

use thiserror::Error;

use crate::journal::UploadJournal;
use crate::models::{BlockOutcome, EventBatch, ResultCode, UploadSummary};
use crate::settings::UploadSettings;
use crate::store::{LogQueue, QueuedLog, StoreError};

#[derive(Debug, Error)]
pub enum UploadError {
    /// The recorder is switched off; shipping is refused outright.
    #[error("event log recorder is not enabled")]
    RecorderDisabled,
    #[error(transparent)]
    Queue(#[from] StoreError),
}

/// What one upload pass decided about a single queued log.
enum LogOutcome {
    /// Every block was accepted.
    Uploaded,
    /// The server gave a definitive verdict on at least one block, but not
    /// every block was accepted.
    Settled,
    /// The file can never be shipped; drop it without posting further.
    Invalid(String),
    /// Nothing definitive happened; keep the file for a later pass.
    Retained,
}

/// Drives upload passes over a pending-log queue.
///
/// Holds one [`StatClient`] for its whole lifetime, so every pass and every
/// block reuse the same connection pool.
pub struct Uploader<Q> {
    settings: UploadSettings,
    client: Option<StatClient>,
    queue: Q,
    journal: UploadJournal,
    user: String,
}

impl<Q: LogQueue> Uploader<Q> {
    pub fn new(settings: UploadSettings, queue: Q, journal: UploadJournal) -> anyhow::Result<Self> {
        let user = journal.device_id()?;
        let client = settings
            .service_url
            .as_ref()
            .map(|url| StatClient::new(url, settings.api_token.clone()));

        Ok(Self {
            settings,
            client,
            queue,
            journal,
            user,
        })
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Run one upload pass.
    ///
    /// Pre-flight outcomes that are configuration verdicts (missing URL,
    /// transmission not permitted) classify into the summary; a disabled
    /// recorder is an error. Every finished pass is recorded in the journal.
    pub async fn send(&self) -> Result<UploadSummary, UploadError> {
        if !self.settings.enabled {
            return Err(UploadError::RecorderDisabled);
        }
        let Some(client) = &self.client else {
            return Ok(UploadSummary::new(
                ResultCode::ErrorInConfig,
                "No statistics service URL configured.",
                0,
                0,
            ));
        };
        if !self.settings.permitted {
            return Ok(UploadSummary::new(
                ResultCode::NotPermittedServer,
                "Transmission is not permitted by the server.",
                0,
                0,
            ));
        }

        let logs = self.queue.pending()?;
        tracing::debug!("Found {} pending event log(s)", logs.len());

        let mut uploaded = 0usize;
        let mut to_remove: Vec<QueuedLog> = Vec::with_capacity(logs.len());
        for log in &logs {
            match self.ship_log(client, log).await {
                LogOutcome::Uploaded => {
                    uploaded += 1;
                    to_remove.push(log.clone());
                }
                LogOutcome::Settled => to_remove.push(log.clone()),
                LogOutcome::Invalid(reason) => {
                    tracing::trace!("Dropping {}: {}", log.name, reason);
                    to_remove.push(log.clone());
                }
                LogOutcome::Retained => {}
            }
        }

        self.cleanup(&to_remove);

        let summary = summarize(logs.len(), uploaded);
        self.journal_pass(&summary);
        Ok(summary)
    }

    /// Ship one queued log: parse, chunk, validate every block, then post
    /// them in order. Validation failures drop the whole file before any
    /// block is posted.
    async fn ship_log(&self, client: &StatClient, log: &QueuedLog) -> LogOutcome {
        let events = match self.queue.read(log) {
            Ok(events) => events,
            Err(e) => return LogOutcome::Invalid(format!("unreadable: {}", e)),
        };
        if events.is_empty() {
            return LogOutcome::Invalid("file is empty or has an invalid format".to_string());
        }

        let blocks = EventBatch::chunked(
            &self.settings.product,
            &self.user,
            events,
            self.settings.max_events_per_request,
        );
        for block in &blocks {
            if let Err(reason) = block.validate() {
                return LogOutcome::Invalid(format!("cannot upload event log, {}", reason));
            }
        }

        let mut accepted = 0usize;
        let mut rejected = 0usize;
        for block in &blocks {
            match client.send_block(block).await {
                Ok(BlockOutcome::Accepted) => accepted += 1,
                Ok(BlockOutcome::Rejected(body)) => {
                    rejected += 1;
                    tracing::trace!("Block from {} rejected: {}", log.name, body);
                }
                Ok(BlockOutcome::Failed(status, body)) => {
                    tracing::trace!("Block from {} failed with {}: {}", log.name, status, body);
                }
                Err(e) => {
                    tracing::warn!("Block from {} could not be sent: {}", log.name, e);
                }
            }
        }

        if accepted == blocks.len() {
            LogOutcome::Uploaded
        } else if accepted > 0 || rejected > 0 {
            LogOutcome::Settled
        } else {
            LogOutcome::Retained
        }
    }

    /// Delete shipped and invalid files. A failed deletion is logged and
    /// skipped; the file will be considered again on the next pass.
    fn cleanup(&self, to_remove: &[QueuedLog]) {
        for log in to_remove {
            match self.queue.remove(log) {
                Ok(()) => tracing::trace!("Removed event log: {}", log.name),
                Err(e) => tracing::warn!("Failed deleting event log {}: {}", log.name, e),
            }
        }
    }

    /// Journal bookkeeping never fails a finished pass.
    fn journal_pass(&self, summary: &UploadSummary) {
        if let Err(e) = self.journal.set_last_sent(chrono::Utc::now()) {
            tracing::warn!("Failed recording last-sent time: {}", e);
        }
        if let Err(e) = self.journal.record_attempt(summary) {
            tracing::warn!("Failed recording upload attempt: {}", e);
        }
    }
}

fn summarize(total: usize, uploaded: usize) -> UploadSummary {
    if total == 0 {
        UploadSummary::new(ResultCode::NothingToSend, "No files to upload.", 0, 0)
    } else if uploaded != total {
        UploadSummary::new(
            ResultCode::SentWithErrors,
            format!("Uploaded {} out of {} files.", uploaded, total),
            total,
            uploaded,
        )
    } else {
        UploadSummary::new(
            ResultCode::Send,
            format!("Uploaded {} files.", uploaded),
            total,
            uploaded,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_summarizes_as_nothing_to_send() {
        let summary = summarize(0, 0);
        assert_eq!(summary.code, ResultCode::NothingToSend);
        assert_eq!(summary.message, "No files to upload.");
    }

    #[test]
    fn partial_upload_summarizes_as_sent_with_errors() {
        let summary = summarize(3, 1);
        assert_eq!(summary.code, ResultCode::SentWithErrors);
        assert_eq!(summary.message, "Uploaded 1 out of 3 files.");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.uploaded, 1);
    }

    #[test]
    fn complete_upload_summarizes_as_send() {
        let summary = summarize(2, 2);
        assert_eq!(summary.code, ResultCode::Send);
        assert_eq!(summary.message, "Uploaded 2 files.");
    }
}
