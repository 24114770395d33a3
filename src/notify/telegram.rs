use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{NotificationEvent, Notifier};
use crate::config::MonitorConfig;
use crate::error::NotifyError;

/// Longest `retry_after` we are willing to wait inside one cycle.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);
const BASE_RETRY_WAIT_MS: u64 = 500;

/// Wait before retry `attempt` (1-based) when Telegram gives no `retry_after`.
fn backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(6);
    Duration::from_millis(BASE_RETRY_WAIT_MS << exp).min(MAX_RETRY_WAIT)
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API `sendMessage`.
///
/// Only rate-limit rejections (429) are retried: Telegram did not accept the
/// message, so a retry cannot produce a duplicate.
#[derive(Clone)]
pub struct TelegramNotifier {
    endpoint: String,
    client: Client,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            endpoint: format!(
                "{}/bot{}/sendMessage",
                cfg.telegram_api_url, cfg.telegram_token
            ),
            client,
            max_retries: cfg.notify_max_retries,
        })
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &ev.destination,
            text: &ev.text,
            disable_web_page_preview: false,
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let rsp = self.client.post(&self.endpoint).json(&payload).send().await?;
            let status = rsp.status();
            let body = rsp.text().await.unwrap_or_default();
            let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();

            if status.is_success() && parsed.as_ref().map_or(true, |r| r.ok) {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt <= u32::from(self.max_retries) {
                let wait = parsed
                    .as_ref()
                    .and_then(|r| r.parameters.as_ref())
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs)
                    .map_or_else(|| backoff(attempt), |w| w.min(MAX_RETRY_WAIT));
                tracing::debug!(attempt, ?wait, "telegram rate limited");
                tokio::time::sleep(wait).await;
                continue;
            }

            let message = parsed
                .and_then(|r| r.description)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
