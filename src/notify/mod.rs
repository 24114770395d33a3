// src/notify/mod.rs
pub mod dry_run;
pub mod telegram;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::poller::Fingerprint;

pub use self::dry_run::LogNotifier;
pub use self::telegram::TelegramNotifier;

/// One message for one destination. Consumed by a single `send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub destination: String,
    pub text: String,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
}

/// Delivery is at-most-once: callers log and drop on error.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<(), NotifyError>;
    fn name(&self) -> &str;
}
