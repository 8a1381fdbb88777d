// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pidfile handles and contents.
//!
//! A remote test process reports progress by writing a small status file
//! next to its results: its pid on the first line, then on exit the exit
//! status and the count of failed tests. The scheduler only ever reads
//! these files.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pidfile written by the test-runner process itself.
pub const AUTOSERV_PIDFILE: &str = ".autoserv_execute";

/// Pidfile written by the results parser.
pub const PARSER_PIDFILE: &str = ".parser_execute";

/// A process on a drone, identified well enough for a liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Process {
    pub hostname: String,
    pub pid: u32,
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hostname, self.pid)
    }
}

/// Opaque correlation handle for one pidfile: the execution tag names the
/// results directory, the pidfile name distinguishes runner from parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PidfileId {
    pub tag: String,
    pub pidfile_name: String,
}

impl PidfileId {
    pub fn new(tag: impl Into<String>, pidfile_name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            pidfile_name: pidfile_name.into(),
        }
    }
}

impl fmt::Display for PidfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tag, self.pidfile_name)
    }
}

/// Parsed pidfile contents.
///
/// Population is monotonic on the writer's side: pid first, exit status and
/// failure count only after the process exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidfileContents {
    pub pid: Option<u32>,
    pub exit_status: Option<i32>,
    pub num_tests_failed: Option<u32>,
}

/// Explicit invalid-pidfile error value. Readers surface this as a typed
/// failure; it is never interpreted as partial state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PidfileParseError {
    #[error("bad pid line: {0:?}")]
    BadPid(String),
    #[error("bad exit status line: {0:?}")]
    BadExitStatus(String),
    #[error("bad failed-test count line: {0:?}")]
    BadFailureCount(String),
    #[error("exit status present without pid")]
    ExitWithoutPid,
}

impl PidfileContents {
    /// No pid yet: the process has not reported itself.
    pub fn is_empty(&self) -> bool {
        self.pid.is_none()
    }

    /// All three fields present: the process exited and flushed.
    pub fn is_complete(&self) -> bool {
        self.pid.is_some() && self.exit_status.is_some() && self.num_tests_failed.is_some()
    }

    /// Parse raw pidfile text.
    ///
    /// Line 1: pid. Line 2: exit status. Line 3: failed-test count.
    /// Missing trailing lines mean the writer has not got that far; any
    /// malformed line is an invalid pidfile, not a partial one.
    pub fn parse(raw: &str) -> Result<Self, PidfileParseError> {
        let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());

        let pid = match lines.next() {
            None => return Ok(Self::default()),
            Some(line) => Some(
                line.parse::<u32>()
                    .map_err(|_| PidfileParseError::BadPid(line.to_string()))?,
            ),
        };

        let exit_status = match lines.next() {
            None => None,
            Some(line) => Some(
                line.parse::<i32>()
                    .map_err(|_| PidfileParseError::BadExitStatus(line.to_string()))?,
            ),
        };

        let num_tests_failed = match lines.next() {
            None => None,
            Some(line) => Some(
                line.parse::<u32>()
                    .map_err(|_| PidfileParseError::BadFailureCount(line.to_string()))?,
            ),
        };

        if exit_status.is_some() && pid.is_none() {
            return Err(PidfileParseError::ExitWithoutPid);
        }

        Ok(Self {
            pid,
            exit_status,
            num_tests_failed,
        })
    }
}

#[cfg(test)]
#[path = "pidfile_tests.rs"]
mod tests;
