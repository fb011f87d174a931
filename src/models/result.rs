use serde::{Deserialize, Serialize};

/// Coarse classification of one upload pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Every pending file was uploaded.
    Send,
    /// At least one file failed validation, was rejected, or could not be
    /// posted.
    SentWithErrors,
    /// The pending queue was empty.
    NothingToSend,
    /// The server does not currently permit transmission.
    NotPermittedServer,
    /// No statistics service URL is configured.
    ErrorInConfig,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Send => "send",
            ResultCode::SentWithErrors => "sent_with_errors",
            ResultCode::NothingToSend => "nothing_to_send",
            ResultCode::NotPermittedServer => "not_permitted_server",
            ResultCode::ErrorInConfig => "error_in_config",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "send" => Some(ResultCode::Send),
            "sent_with_errors" => Some(ResultCode::SentWithErrors),
            "nothing_to_send" => Some(ResultCode::NothingToSend),
            "not_permitted_server" => Some(ResultCode::NotPermittedServer),
            "error_in_config" => Some(ResultCode::ErrorInConfig),
            _ => None,
        }
    }
}

/// Result of one upload pass over the pending queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub code: ResultCode,
    pub message: String,
    /// Pending files considered by this pass.
    pub total: usize,
    /// Files whose blocks were all accepted.
    pub uploaded: usize,
}

impl UploadSummary {
    pub fn new(code: ResultCode, message: impl Into<String>, total: usize, uploaded: usize) -> Self {
        Self {
            code,
            message: message.into(),
            total,
            uploaded,
        }
    }
}

/// The server's verdict on a single posted block.
#[derive(Debug)]
pub enum BlockOutcome {
    /// HTTP 200: the block was ingested.
    Accepted,
    /// HTTP 400: the block is malformed and will never be accepted.
    Rejected(String),
    /// Any other status; worth retrying on a later pass.
    Failed(u16, String),
}
