// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod differ;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod poller;
pub mod scheduler;
pub mod state;
pub mod status;

// ---- Re-exports for stable public API ----
pub use crate::config::{FingerprintMode, MonitorConfig};
pub use crate::differ::Differ;
pub use crate::error::{FetchError, NotifyError, PersistError};
pub use crate::monitor::{CycleOutcome, Monitor};
pub use crate::notify::{NotificationEvent, Notifier};
pub use crate::poller::{ActivitySource, Fingerprint, PollResult, Snapshot};
pub use crate::scheduler::{Scheduler, SchedulerCfg, SchedulerHandle, SchedulerState};
pub use crate::state::{JsonFileStore, MemoryStore, ObservedState, StateStore};
pub use crate::status::StatusBoard;
