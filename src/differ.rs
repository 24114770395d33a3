// src/differ.rs
use chrono::{DateTime, FixedOffset, Utc};

use crate::config::MonitorConfig;
use crate::notify::NotificationEvent;
use crate::poller::{PollResult, Snapshot};
use crate::state::ObservedState;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `ts` in the configured timezone.
pub fn format_check_time(ts: DateTime<Utc>, tz: FixedOffset) -> String {
    ts.with_timezone(&tz).format(TIME_FORMAT).to_string()
}

/// Decides whether a poll warrants a message.
#[derive(Debug, Clone)]
pub struct Differ {
    resource: String,
    destination: String,
    timezone: FixedOffset,
}

impl Differ {
    pub fn new(resource: impl Into<String>, destination: impl Into<String>, timezone: FixedOffset) -> Self {
        Self {
            resource: resource.into(),
            destination: destination.into(),
            timezone,
        }
    }

    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self::new(cfg.username.clone(), cfg.chat_id.clone(), cfg.timezone)
    }

    /// The monitored account name, without the leading `@`.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// - failed poll: nothing
    /// - no previous state (cold start): nothing, the caller initializes the store
    /// - same fingerprint: nothing
    /// - different fingerprint: exactly one event
    pub fn compare(
        &self,
        previous: Option<&ObservedState>,
        current: &PollResult,
    ) -> Option<NotificationEvent> {
        let snapshot = current.as_ref().ok()?;
        let previous = previous?;
        if previous.fingerprint == snapshot.fingerprint {
            return None;
        }
        Some(self.event(snapshot, self.change_text(snapshot)))
    }

    /// "Nothing new" report for heartbeat mode.
    pub fn heartbeat(&self, snapshot: &Snapshot) -> NotificationEvent {
        let text = format!(
            "@{} check at {} - No new activity detected.",
            self.resource,
            format_check_time(snapshot.fetched_at, self.timezone)
        );
        self.event(snapshot, text)
    }

    fn change_text(&self, snapshot: &Snapshot) -> String {
        let mut text = format!(
            "New Instagram activity on @{} (checked {})\nLatest: {}",
            self.resource,
            format_check_time(snapshot.fetched_at, self.timezone),
            snapshot.fingerprint
        );
        if let Some(detail) = &snapshot.detail {
            text.push('\n');
            text.push_str(detail);
        }
        text
    }

    fn event(&self, snapshot: &Snapshot, text: String) -> NotificationEvent {
        NotificationEvent {
            destination: self.destination.clone(),
            text,
            fingerprint: snapshot.fingerprint.clone(),
            created_at: snapshot.fetched_at,
        }
    }
}
