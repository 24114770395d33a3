// src/poller/mod.rs
pub mod instagram;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FetchError;

/// Opaque value identifying the current state of the monitored resource.
/// Equality is the only meaningful operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What one successful poll saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fingerprint: Fingerprint,
    pub fetched_at: DateTime<Utc>,
    /// Human-readable extra (permalink, caption excerpt) for the message body.
    pub detail: Option<String>,
}

impl Snapshot {
    pub fn new(fingerprint: impl Into<Fingerprint>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            fetched_at,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of one poll attempt. "Nothing new" is an `Ok` with an unchanged fingerprint.
pub type PollResult = Result<Snapshot, FetchError>;

#[async_trait::async_trait]
pub trait ActivitySource: Send + Sync {
    async fn poll(&self) -> PollResult;
    fn name(&self) -> &str;
}
