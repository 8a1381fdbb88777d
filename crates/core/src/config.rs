// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler configuration, loaded from TOML.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A named, ordered set of drone hostnames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DroneSetConfig {
    pub name: String,
    #[serde(default)]
    pub drones: Vec<String>,
}

/// Recognized scheduler options.
///
/// Every field has a default so an absent or empty config file yields a
/// working single-machine setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Cap on concurrently running processes per drone.
    pub max_processes_per_drone: usize,
    /// Seconds a launched process gets to write its pid before it is
    /// declared lost.
    pub pidfile_timeout_secs: u64,
    /// Seconds between periodic maintenance passes.
    pub gc_interval_secs: u64,
    /// Milliseconds between dispatcher ticks in the daemon loop.
    pub tick_interval_ms: u64,
    /// Test-runner binary launched on drones.
    pub autoserv_path: String,
    /// Results-parser binary launched on drones.
    pub parser_path: String,
    /// Root of per-execution results directories (local drone adapter).
    pub results_dir: Option<PathBuf>,
    /// Drone set definitions. Empty means a single implicit local drone.
    pub drone_sets: Vec<DroneSetConfig>,
    /// Drone set used when neither the job nor the user names one.
    pub default_drone_set: Option<String>,
    /// Per-user default drone sets, login -> set name.
    pub user_drone_sets: HashMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_processes_per_drone: 10,
            pidfile_timeout_secs: 300,
            gc_interval_secs: 300,
            tick_interval_ms: 1000,
            autoserv_path: "autoserv".to_string(),
            parser_path: "parse".to_string(),
            results_dir: None,
            drone_sets: Vec::new(),
            default_drone_set: None,
            user_drone_sets: HashMap::new(),
        }
    }
}

impl SchedulerConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a file, or defaults if the path is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn drone_set(&self, name: &str) -> Option<&DroneSetConfig> {
        self.drone_sets.iter().find(|set| set.name == name)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
