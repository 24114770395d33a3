//! Instagram activity monitor: binary entrypoint.
//! Loads configuration, starts the poll scheduler (and the optional status
//! server), then waits for Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use activity_monitor::{status, Monitor, MonitorConfig, Scheduler, SchedulerCfg};

/// `RUST_LOG` wins; otherwise info for this crate and warn for dependencies.
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("activity_monitor=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = MonitorConfig::from_env().context("loading configuration")?;
    tracing::debug!(?cfg, "configuration loaded");

    let metrics = match cfg.status_addr {
        Some(_) => Some(status::install_metrics_recorder()?),
        None => None,
    };

    let listener = match cfg.status_addr {
        Some(addr) => Some(status::bind(addr).await?),
        None => None,
    };

    let monitor = Arc::new(Monitor::from_config(&cfg)?);
    let board = monitor.board();
    let handle = Scheduler::new(
        monitor,
        SchedulerCfg {
            interval: cfg.poll_interval,
            shutdown_grace: cfg.shutdown_grace,
        },
    )
    .start();

    let server = listener.map(|listener| {
        tokio::spawn(status::serve(
            listener,
            status::router(board, metrics),
            handle.shutdown_signal(),
        ))
    });

    wait_for_interrupt().await;
    tracing::info!("Stopping the monitor...");
    handle.shutdown().await;

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("status server: {e:#}"),
            Err(e) => tracing::warn!("status server task: {e}"),
        }
    }
    Ok(())
}
