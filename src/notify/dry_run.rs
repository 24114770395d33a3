use super::{NotificationEvent, Notifier};
use crate::error::NotifyError;

/// Dry-run notifier: writes the message to the log instead of a chat.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            destination = %ev.destination,
            fingerprint = %ev.fingerprint,
            "dry run, not sending: {}",
            ev.text
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
