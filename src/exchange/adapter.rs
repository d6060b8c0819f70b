use async_trait::async_trait;
use thiserror::Error;

use crate::model::{OrderAck, OrderRequest};

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Network error: {message}")]
    Transport { message: String, timed_out: bool },
    #[error("Order rejected (HTTP {status}){}", rejection_detail(.code, .message))]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: Option<String>,
    },
    #[error("Failed to decode exchange response: {0}")]
    Decode(String),
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Invalid order request: {0}")]
    InvalidRequest(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

fn rejection_detail(code: &Option<i64>, message: &Option<String>) -> String {
    match (code, message) {
        (Some(code), Some(msg)) => format!(": {} ({})", msg, code),
        (Some(code), None) => format!(": code {}", code),
        (None, Some(msg)) => format!(": {}", msg),
        (None, None) => String::new(),
    }
}

impl SubmissionError {
    /// Transport failures look retryable; nothing here retries them, since
    /// resending a signed, timestamped order can duplicate it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::Transport { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::Transport { timed_out: true, .. } => "timeout",
            SubmissionError::Transport { .. } => "transport",
            SubmissionError::Rejected { .. } => "rejected",
            SubmissionError::Decode(_) => "decode",
            SubmissionError::Signing(_) => "signing",
            SubmissionError::InvalidRequest(_) => "invalid_request",
            SubmissionError::Unsupported(_) => "unsupported",
            SubmissionError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        SubmissionError::Transport {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        }
    }
}

/// Order submission capability. One implementation is chosen at startup.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Place an order and return the exchange acknowledgement.
    async fn submit(&self, order: &OrderRequest) -> Result<OrderAck, SubmissionError>;

    /// Executor name for logs (e.g., "mexc-rest")
    fn name(&self) -> &str;
}
