//! HTTP client for the statistics endpoint.
//!
//! One pooled [`reqwest::Client`] is built per [`StatClient`] and reused for
//! every posted block. Server verdicts are not errors: 200, 400 and anything
//! else map onto [`BlockOutcome`] so the upload pass can decide what happens
//! to the owning file. Only transport failures surface as [`ClientError`].

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::models::{BlockOutcome, EventBatch};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Pooled HTTP client shipping event batches.
#[derive(Debug, Clone)]
pub struct StatClient {
    service_url: String,
    api_token: Option<String>,
    client: Client,
}

impl StatClient {
    pub fn new(service_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            service_url: service_url.into(),
            api_token,
            client: Client::new(),
        }
    }

    /// POST one block and classify the server's verdict.
    pub async fn send_block(&self, batch: &EventBatch) -> Result<BlockOutcome, ClientError> {
        let mut request = self.client.post(&self.service_url).json(batch);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        Ok(match status {
            StatusCode::OK => BlockOutcome::Accepted,
            StatusCode::BAD_REQUEST => BlockOutcome::Rejected(body),
            _ => BlockOutcome::Failed(status.as_u16(), body),
        })
    }
}
