// tests/common/mod.rs
// Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity_monitor::config::FileConfig;
use activity_monitor::{
    ActivitySource, Differ, FetchError, Monitor, MonitorConfig, NotificationEvent, Notifier,
    NotifyError, ObservedState, PersistError, PollResult, Snapshot, StateStore,
};
use chrono::{FixedOffset, TimeZone, Utc};

pub fn ok(fp: &str) -> PollResult {
    Ok(Snapshot::new(fp, Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()))
}

pub fn fail() -> PollResult {
    Err(FetchError::Network("connection refused".into()))
}

/// Replays scripted results in order; once exhausted, keeps returning the last one.
pub struct ScriptedSource {
    script: Mutex<VecDeque<PollResult>>,
    last: Mutex<Option<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<PollResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl ActivitySource for ScriptedSource {
    async fn poll(&self) -> PollResult {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(s)) => {
                *self.last.lock().unwrap() = Some(s.fingerprint.to_string());
                Ok(s)
            }
            Some(Err(e)) => Err(e),
            None => match self.last.lock().unwrap().clone() {
                Some(fp) => ok(&fp),
                None => fail(),
            },
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Counts polls and how many run at once; each poll takes `delay`.
pub struct SlowSource {
    pub delay: Duration,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ActivitySource for SlowSource {
    async fn poll(&self) -> PollResult {
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        ok(&format!("post_{n}"))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Records every event it is asked to send; fails while `failing` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NotificationEvent>>,
    pub attempts: AtomicUsize,
    pub failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            failing: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.text.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Rejected {
                status: 400,
                message: "chat not found".into(),
            });
        }
        self.sent.lock().unwrap().push(ev.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Loads fine, refuses every write.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub state: Mutex<Option<ObservedState>>,
}

#[async_trait::async_trait]
impl StateStore for ReadOnlyStore {
    async fn load(&self) -> Result<Option<ObservedState>, PersistError> {
        Ok(self.state.lock().unwrap().clone())
    }

    async fn save(&self, _state: &ObservedState) -> Result<(), PersistError> {
        Err(PersistError::Io {
            path: "/read-only/last_seen.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

pub fn differ() -> Differ {
    Differ::new("natgeo", "-1001", FixedOffset::east_opt(0).unwrap())
}

pub fn monitor(
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
) -> Monitor {
    Monitor::new(source, store, notifier, differ())
}

/// Config built from explicit key/value pairs on top of the required keys.
pub fn config(extra: &[(&str, &str)]) -> MonitorConfig {
    let mut map: HashMap<String, String> = [
        ("TELEGRAM_TOKEN", "test-token"),
        ("CHAT_ID", "-1001"),
        ("INSTAGRAM_USERNAME", "natgeo"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        map.insert(k.to_string(), v.to_string());
    }
    MonitorConfig::resolve(FileConfig::default(), |k| map.get(k).cloned()).expect("test config")
}
