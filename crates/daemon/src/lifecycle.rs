// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: lock, logging, and the tick loop.

use crate::config::DaemonConfig;
use fs2::FileExt;
use parking_lot::Mutex;
use rig_adapters::LocalDroneAdapter;
use rig_core::{SchedulerConfig, SystemClock};
use rig_engine::Dispatcher;
use rig_storage::SchedulerState;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Daemon dispatcher with concrete adapter types.
pub type DaemonDispatcher = Dispatcher<LocalDroneAdapter, SystemClock>;

/// Errors during daemon startup and shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] rig_core::ConfigError),
    #[error("cannot resolve state dir: {0}")]
    StateDir(String),
    #[error("another rigd already holds the lock: {0}")]
    LockFailed(String),
}

/// Acquire the exclusive daemon lock and record our pid in it.
///
/// The returned file must stay open for the daemon's lifetime; the lock
/// releases on drop.
pub fn acquire_lock(config: &DaemonConfig) -> Result<File, LifecycleError> {
    let mut file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    file.try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(e.to_string()))?;
    file.set_len(0)?;
    file.write_all(format!("{}\n", std::process::id()).as_bytes())?;
    file.sync_all()?;
    Ok(file)
}

/// Construct the dispatcher from an explicitly built state object.
/// One per process; torn down with it.
pub fn build_dispatcher(
    config: &DaemonConfig,
    scheduler_config: SchedulerConfig,
) -> DaemonDispatcher {
    let results_root = scheduler_config
        .results_dir
        .clone()
        .unwrap_or_else(|| config.results_path.clone());
    let state = Arc::new(Mutex::new(SchedulerState::new()));
    let drones = LocalDroneAdapter::new(results_root);
    Dispatcher::new(state, drones, SystemClock, scheduler_config)
}

/// Drive the dispatcher until `shutdown` resolves.
///
/// A failed tick is logged and retried on the next interval; only
/// shutdown stops the loop.
pub async fn run_loop(
    dispatcher: &mut DaemonDispatcher,
    tick_interval: Duration,
    shutdown: impl std::future::Future<Output = ()>,
) {
    info!(interval_ms = tick_interval.as_millis() as u64, "dispatch loop running");
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = dispatcher.tick().await {
                    error!(error = %e, "tick failed; retrying next interval");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown requested; stopping dispatch loop");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
