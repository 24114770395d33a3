// src/scheduler.rs
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::monitor::Monitor;
use crate::status::StatusBoard;

/// `Idle -> Running -> Stopped`. No way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// How long an in-flight cycle may keep running after shutdown is requested.
    pub shutdown_grace: Duration,
}

/// Drives poll cycles at a fixed cadence. Cycles run one at a time on a single
/// task; ticks that come due while a cycle is still running are skipped.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    cfg: SchedulerCfg,
    board: StatusBoard,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, cfg: SchedulerCfg) -> Self {
        let board = monitor.board();
        board.set_scheduler(SchedulerState::Idle);
        Self {
            monitor,
            cfg,
            board,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.board.scheduler()
    }

    /// Consumes the scheduler, so it cannot be started twice. The first cycle
    /// fires immediately.
    pub fn start(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        self.board.set_scheduler(SchedulerState::Running);

        let resource = self.board.snapshot().resource;
        tracing::info!(
            "Scheduler started. Monitoring @{resource} every {}.",
            describe_interval(self.cfg.interval)
        );

        let board = self.board.clone();
        let task = tokio::spawn(run_loop(self.monitor, self.cfg, self.board, rx));
        SchedulerHandle {
            shutdown: tx,
            task,
            board,
        }
    }
}

async fn run_loop(
    monitor: Arc<Monitor>,
    cfg: SchedulerCfg,
    board: StatusBoard,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }

        let cycle = monitor.run_cycle();
        tokio::pin!(cycle);
        tokio::select! {
            biased;
            outcome = &mut cycle => {
                tracing::debug!(?outcome, "cycle finished");
            }
            _ = shutdown.changed() => {
                match tokio::time::timeout(cfg.shutdown_grace, &mut cycle).await {
                    Ok(outcome) => tracing::debug!(?outcome, "in-flight cycle finished during shutdown"),
                    Err(_) => tracing::warn!(
                        grace = ?cfg.shutdown_grace,
                        "in-flight cycle abandoned after grace period"
                    ),
                }
                break;
            }
        }
    }

    board.set_scheduler(SchedulerState::Stopped);
    tracing::debug!("scheduler loop exited");
}

/// Owned by whoever started the scheduler; dropping it without `shutdown`
/// also stops the loop (the watch sender goes away).
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    board: StatusBoard,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        self.board.scheduler()
    }

    /// Receiver that flips to `true` when shutdown is requested.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Request shutdown and wait for the loop to stop (bounded by the grace period
    /// of an in-flight cycle).
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("scheduler task ended abnormally: {e}");
            self.board.set_scheduler(SchedulerState::Stopped);
        }
    }
}

fn describe_interval(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        60 => "minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "second".to_string(),
        s => format!("{s} seconds"),
    }
}
