// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rig daemon (rigd)
//!
//! Long-lived process that owns the dispatch loop. Jobs, hosts, and queue
//! entries arrive through the external store; rigd schedules, launches,
//! and reconciles them.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use rig_core::SchedulerConfig;
use rig_daemon::lifecycle::{acquire_lock, build_dispatcher, run_loop};
use rig_daemon::{DaemonConfig, LifecycleError};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("rigd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("rigd {}", env!("CARGO_PKG_VERSION"));
                println!("rig scheduler daemon - assigns queued test jobs to hosts and");
                println!("reconciles their execution.");
                println!();
                println!("USAGE:");
                println!("    rigd");
                println!();
                println!("Configuration is read from $RIG_CONFIG (or rig.toml in the");
                println!("state directory). There is no other CLI surface.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: rigd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = DaemonConfig::load()?;
    let _log_guard = setup_logging(&config)?;

    let lock_file = match acquire_lock(&config) {
        Ok(file) => file,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("rigd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let scheduler_config = SchedulerConfig::load(&config.scheduler_config_path)?;
    let tick_interval = Duration::from_millis(scheduler_config.tick_interval_ms);

    info!(
        state_dir = %config.state_dir.display(),
        config = %config.scheduler_config_path.display(),
        "starting rigd"
    );

    let mut dispatcher = build_dispatcher(&config, scheduler_config);

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    };

    run_loop(&mut dispatcher, tick_interval, shutdown).await;

    info!("rigd stopped");
    drop(lock_file);
    Ok(())
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    let log_dir = config
        .log_path
        .parent()
        .unwrap_or(&config.state_dir)
        .to_path_buf();
    let log_file = config
        .log_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "daemon.log".into());
    let appender = tracing_appender::rolling::never(log_dir, log_file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
