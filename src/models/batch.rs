use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LogEvent;

/// One block POSTed to the statistics endpoint.
///
/// A pending log file is chunked into blocks of bounded size; every block
/// carries the product code and the anonymous device id of the installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub product: String,
    pub user: String,
    pub events: Vec<LogEvent>,
}

/// Why a batch can never be accepted by the endpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidBatch {
    #[error("event list is empty")]
    EmptyEvents,
    #[error("user id is empty")]
    EmptyUser,
    #[error("product code is empty")]
    EmptyProduct,
}

impl EventBatch {
    pub fn new(product: impl Into<String>, user: impl Into<String>, events: Vec<LogEvent>) -> Self {
        Self {
            product: product.into(),
            user: user.into(),
            events,
        }
    }

    /// Check the rules the endpoint enforces: a batch must name a product and
    /// a user and must carry at least one event.
    pub fn validate(&self) -> Result<(), InvalidBatch> {
        if self.events.is_empty() {
            return Err(InvalidBatch::EmptyEvents);
        }
        if self.user.is_empty() {
            return Err(InvalidBatch::EmptyUser);
        }
        if self.product.is_empty() {
            return Err(InvalidBatch::EmptyProduct);
        }
        Ok(())
    }

    /// Split `events` into blocks of at most `max_events` each. No block is
    /// ever empty; an empty event list yields no blocks.
    pub fn chunked(
        product: &str,
        user: &str,
        events: Vec<LogEvent>,
        max_events: usize,
    ) -> Vec<EventBatch> {
        let max_events = max_events.max(1);
        events
            .chunks(max_events)
            .map(|chunk| EventBatch::new(product, user, chunk.to_vec()))
            .collect()
    }
}
