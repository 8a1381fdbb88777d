// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon path configuration.

use crate::lifecycle::LifecycleError;
use std::path::PathBuf;

/// Fixed paths under the daemon's state directory.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root state directory (e.g. ~/.local/state/rig).
    pub state_dir: PathBuf,
    /// Path to lock/PID file.
    pub lock_path: PathBuf,
    /// Path to daemon log file.
    pub log_path: PathBuf,
    /// Root of per-execution results directories.
    pub results_path: PathBuf,
    /// Path to the scheduler config file (TOML).
    pub scheduler_config_path: PathBuf,
}

impl DaemonConfig {
    /// Resolve paths for the user-level daemon.
    ///
    /// `RIG_STATE_DIR` overrides the default of
    /// `$XDG_STATE_HOME/rig` (falling back to `~/.local/state/rig`).
    /// `RIG_CONFIG` overrides the scheduler config path.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = match std::env::var_os("RIG_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::state_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
                .ok_or_else(|| {
                    LifecycleError::StateDir("cannot determine a state directory".to_string())
                })?
                .join("rig"),
        };
        std::fs::create_dir_all(&state_dir)?;

        let scheduler_config_path = match std::env::var_os("RIG_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => state_dir.join("rig.toml"),
        };

        Ok(Self {
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            results_path: state_dir.join("results"),
            scheduler_config_path,
            state_dir,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
