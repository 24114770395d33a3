// src/monitor.rs
// One poll cycle: poll -> compare -> persist -> (maybe) notify.
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::differ::Differ;
use crate::notify::{LogNotifier, NotificationEvent, Notifier, TelegramNotifier};
use crate::poller::instagram::InstagramSource;
use crate::poller::{ActivitySource, Fingerprint};
use crate::state::{JsonFileStore, ObservedState, StateStore};
use crate::status::StatusBoard;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_cycles_total", "Poll cycles started.");
        describe_counter!("monitor_fetch_errors_total", "Polls that failed to fetch.");
        describe_counter!("monitor_notifications_total", "Messages delivered.");
        describe_counter!("monitor_notify_errors_total", "Messages dropped on send error.");
        describe_counter!(
            "monitor_persist_errors_total",
            "State store reads/writes that failed."
        );
        describe_gauge!("monitor_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Source unreachable or unparsable; stored state untouched.
    FetchFailed { error: String },
    /// First successful poll; state initialized, nothing sent.
    ColdStart { fingerprint: Fingerprint },
    Unchanged { fingerprint: Fingerprint },
    Changed {
        fingerprint: Fingerprint,
        delivered: bool,
    },
}

impl CycleOutcome {
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            CycleOutcome::FetchFailed { .. } => None,
            CycleOutcome::ColdStart { fingerprint }
            | CycleOutcome::Unchanged { fingerprint }
            | CycleOutcome::Changed { fingerprint, .. } => Some(fingerprint),
        }
    }
}

pub struct Monitor {
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    differ: Differ,
    heartbeat: bool,
    board: StatusBoard,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        differ: Differ,
    ) -> Self {
        let board = StatusBoard::new(differ.resource());
        Self {
            source,
            store,
            notifier,
            differ,
            heartbeat: false,
            board,
        }
    }

    pub fn with_heartbeat(mut self, on: bool) -> Self {
        self.heartbeat = on;
        self
    }

    /// Production wiring: Instagram source, JSON state file, Telegram (or log in dry run).
    pub fn from_config(cfg: &MonitorConfig) -> anyhow::Result<Self> {
        let source = Arc::new(InstagramSource::new(cfg)?);
        let store = Arc::new(JsonFileStore::new(cfg.state_path.clone()));
        let notifier: Arc<dyn Notifier> = if cfg.dry_run {
            Arc::new(LogNotifier)
        } else {
            Arc::new(TelegramNotifier::new(cfg)?)
        };
        Ok(Self::new(source, store, notifier, Differ::from_config(cfg)).with_heartbeat(cfg.heartbeat))
    }

    pub fn board(&self) -> StatusBoard {
        self.board.clone()
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        ensure_metrics_described();
        counter!("monitor_cycles_total").increment(1);

        let poll = self.source.poll().await;
        let snapshot = match &poll {
            Ok(s) => s.clone(),
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "poll failed, keeping stored state");
                counter!("monitor_fetch_errors_total").increment(1);
                return self.finish(CycleOutcome::FetchFailed {
                    error: e.to_string(),
                });
            }
        };

        let previous = match self.store.load().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "state unreadable, treating as cold start");
                counter!("monitor_persist_errors_total").increment(1);
                None
            }
        };

        let event = self.differ.compare(previous.as_ref(), &poll);
        let unchanged = previous
            .as_ref()
            .is_some_and(|p| p.fingerprint == snapshot.fingerprint);

        // Persisted before sending: a crash in between loses a message, never duplicates one.
        if !unchanged {
            let next = ObservedState::new(snapshot.fingerprint.clone(), snapshot.fetched_at);
            if let Err(e) = self.store.save(&next).await {
                tracing::error!(error = %e, "failed to persist state");
                counter!("monitor_persist_errors_total").increment(1);
            }
        }

        let fingerprint = snapshot.fingerprint.clone();
        let outcome = match (previous, event) {
            (None, _) => {
                tracing::info!(%fingerprint, "initial state recorded");
                CycleOutcome::ColdStart { fingerprint }
            }
            (Some(_), Some(ev)) => {
                let delivered = self.deliver(&ev).await;
                CycleOutcome::Changed {
                    fingerprint,
                    delivered,
                }
            }
            (Some(_), None) => {
                tracing::debug!(%fingerprint, "no change");
                if self.heartbeat {
                    self.deliver(&self.differ.heartbeat(&snapshot)).await;
                }
                CycleOutcome::Unchanged { fingerprint }
            }
        };
        self.finish(outcome)
    }

    async fn deliver(&self, ev: &NotificationEvent) -> bool {
        match self.notifier.send(ev).await {
            Ok(()) => {
                tracing::info!(notifier = self.notifier.name(), "Message sent: {}", ev.text);
                counter!("monitor_notifications_total").increment(1);
                true
            }
            Err(e) => {
                tracing::error!(notifier = self.notifier.name(), "Error sending message: {e}");
                counter!("monitor_notify_errors_total").increment(1);
                false
            }
        }
    }

    fn finish(&self, outcome: CycleOutcome) -> CycleOutcome {
        let now: DateTime<Utc> = Utc::now();
        gauge!("monitor_last_cycle_ts").set(now.timestamp() as f64);
        self.board.record_cycle(&outcome, now);
        outcome
    }
}
