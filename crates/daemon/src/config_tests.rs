// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::DaemonConfig;
use serial_test::serial;

#[test]
#[serial]
fn state_dir_env_override_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("RIG_STATE_DIR", dir.path());
    std::env::remove_var("RIG_CONFIG");

    let config = DaemonConfig::load().unwrap();

    assert_eq!(config.state_dir, dir.path());
    assert_eq!(config.lock_path, dir.path().join("daemon.pid"));
    assert_eq!(config.log_path, dir.path().join("daemon.log"));
    assert_eq!(config.results_path, dir.path().join("results"));
    assert_eq!(config.scheduler_config_path, dir.path().join("rig.toml"));

    std::env::remove_var("RIG_STATE_DIR");
}

#[test]
#[serial]
fn scheduler_config_env_override_wins() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("RIG_STATE_DIR", dir.path());
    std::env::set_var("RIG_CONFIG", dir.path().join("custom.toml"));

    let config = DaemonConfig::load().unwrap();
    assert_eq!(config.scheduler_config_path, dir.path().join("custom.toml"));

    std::env::remove_var("RIG_STATE_DIR");
    std::env::remove_var("RIG_CONFIG");
}

#[test]
#[serial]
fn load_creates_the_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested/rig");
    std::env::set_var("RIG_STATE_DIR", &nested);
    std::env::remove_var("RIG_CONFIG");

    let config = DaemonConfig::load().unwrap();
    assert!(config.state_dir.is_dir());

    std::env::remove_var("RIG_STATE_DIR");
}
