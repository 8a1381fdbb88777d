// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local drone adapter: runs test processes on the scheduler's own machine.
//!
//! Each execution gets a results directory under the configured root,
//! named by its execution tag. The launched shell writes the standard
//! pidfile itself (pid first, exit status and failed-test count after the
//! command exits), so the engine observes a local process exactly the way
//! it would observe one on a remote drone.

use super::{DroneAdapter, DroneError, ExecutionRequest, Launch};
use async_trait::async_trait;
use rig_core::{PidfileContents, PidfileId, Process};
use std::path::PathBuf;

/// Hostname the local adapter reports for every launch.
pub const LOCAL_HOSTNAME: &str = "localhost";

/// Marker file a test command may write to report its failed-test count.
const FAILED_COUNT_FILE: &str = ".failed_count";

/// Escape a string for embedding in single quotes in a shell command.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Drone adapter that executes everything on the local machine.
#[derive(Debug, Clone)]
pub struct LocalDroneAdapter {
    results_root: PathBuf,
}

impl LocalDroneAdapter {
    pub fn new(results_root: impl Into<PathBuf>) -> Self {
        Self {
            results_root: results_root.into(),
        }
    }

    fn pidfile_path(&self, id: &PidfileId) -> PathBuf {
        self.results_root.join(&id.tag).join(&id.pidfile_name)
    }

    /// Wrapper script: report our pid, run the command with output
    /// captured, then append exit status and failed-test count in one
    /// write so readers never see a half-flushed exit record.
    fn wrapper_script(&self, request: &ExecutionRequest, dir: &std::path::Path) -> String {
        let pidfile = shell_quote(&dir.join(&request.pidfile_name).display().to_string());
        let log = shell_quote(&dir.join("command.log").display().to_string());
        let command = request
            .command
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "echo $$ > {pidfile}\n\
             {command} > {log} 2>&1\n\
             status=$?\n\
             failed=0\n\
             [ -f {failed_file} ] && failed=$(cat {failed_file})\n\
             printf '%s\\n%s\\n' \"$status\" \"$failed\" >> {pidfile}\n",
            pidfile = pidfile,
            command = command,
            log = log,
            failed_file = shell_quote(&dir.join(FAILED_COUNT_FILE).display().to_string()),
        )
    }
}

#[async_trait]
impl DroneAdapter for LocalDroneAdapter {
    async fn execute(&self, request: &ExecutionRequest) -> Result<Launch, DroneError> {
        if let Some(allowed) = &request.drone_hostnames_allowed {
            if !allowed.contains(LOCAL_HOSTNAME) {
                return Err(DroneError::NoDroneAvailable {
                    tag: request.tag.clone(),
                });
            }
        }

        let dir = self.results_root.join(&request.tag);
        tokio::fs::create_dir_all(&dir).await?;

        let script = self.wrapper_script(request, &dir);
        let child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(&script)
            .current_dir(&dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| DroneError::SpawnFailed(e.to_string()))?;

        tracing::info!(tag = %request.tag, pid = ?child.id(), "launched local process");

        // Reap in the background; progress is observed via the pidfile.
        tokio::spawn(async move {
            let mut child = child;
            let _ = child.wait().await;
        });

        Ok(Launch {
            pidfile_id: self.pidfile_id_from(&request.tag, &request.pidfile_name),
            hostname: LOCAL_HOSTNAME.to_string(),
        })
    }

    async fn get_pidfile_contents(
        &self,
        id: &PidfileId,
        _use_second_read: bool,
    ) -> Result<PidfileContents, DroneError> {
        // Local reads are never cached; the second read is just a re-read.
        let path = self.pidfile_path(id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PidfileContents::default())
            }
            Err(e) => return Err(e.into()),
        };

        PidfileContents::parse(&raw).map_err(|source| DroneError::InvalidPidfile {
            id: id.clone(),
            source,
        })
    }

    async fn is_process_running(&self, process: &Process) -> Result<bool, DroneError> {
        if process.hostname != LOCAL_HOSTNAME {
            return Ok(false);
        }
        let status = tokio::process::Command::new("kill")
            .args(["-0", &process.pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        Ok(status.success())
    }

    async fn kill_process(&self, process: &Process) -> Result<(), DroneError> {
        if process.hostname != LOCAL_HOSTNAME {
            return Ok(());
        }
        tracing::info!(pid = process.pid, "killing local process");
        let _ = tokio::process::Command::new("kill")
            .args(["-TERM", &process.pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
