//! Record store error types

use thiserror::Error;

/// Failure talking to the record store.
///
/// Details are for logs only; users see a generic failure prompt.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode store response: {0}")]
    Decode(String),
    #[error("insert returned no row")]
    EmptyInsert,
}

impl StoreError {
    /// Short machine-friendly label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Transport(e) if e.is_timeout() => "timeout",
            StoreError::Transport(_) => "transport",
            StoreError::Status { status, .. } if *status >= 500 => "server",
            StoreError::Status { .. } => "rejected",
            StoreError::Decode(_) => "decode",
            StoreError::EmptyInsert => "empty_insert",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
