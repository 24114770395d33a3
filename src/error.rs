// src/error.rs
// Per-stage errors of a poll cycle. None of them terminate the process.
use thiserror::Error;

/// The monitored resource could not be read this cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("source returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// The message could not be delivered. Logged and dropped by the caller.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),

    #[error("delivery rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

// The request URL embeds the bot token, so it is stripped before the error is rendered.
impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Network(err.without_url().to_string())
    }
}

/// The state store could not be read or written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state io at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
