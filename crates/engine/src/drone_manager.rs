// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drone manager: scope resolution and the process throttle.
//!
//! Answers two questions: which drones may a task use, and how many more
//! processes may start right now for that scope. Usage is recomputed from
//! the live agent set on every query; there are no counters to drift.

use crate::error::EngineError;
use rig_core::{EntryId, JobId, SchedulerConfig};
use rig_storage::SchedulerState;
use std::collections::{BTreeSet, HashMap};

/// Drone hostnames a task may use. `None` means unrestricted; an empty
/// set means no drone is eligible (which is not the same thing).
pub type DroneScope = Option<BTreeSet<String>>;

/// Tracks drone inventory and resolves scopes and capacity.
#[derive(Debug)]
pub struct DroneManager {
    max_processes_per_drone: usize,
    drone_sets: HashMap<String, BTreeSet<String>>,
    all_drones: BTreeSet<String>,
    default_set: Option<String>,
    user_defaults: HashMap<String, String>,
}

impl DroneManager {
    pub fn new(config: &SchedulerConfig) -> Self {
        let drone_sets: HashMap<String, BTreeSet<String>> = config
            .drone_sets
            .iter()
            .map(|set| (set.name.clone(), set.drones.iter().cloned().collect()))
            .collect();
        let all_drones = drone_sets.values().flatten().cloned().collect();

        Self {
            max_processes_per_drone: config.max_processes_per_drone,
            drone_sets,
            all_drones,
            default_set: config.default_drone_set.clone(),
            user_defaults: config.user_drone_sets.clone(),
        }
    }

    /// Resolve the drone scope for a task.
    ///
    /// Tasks tied to queue entries take the job's explicit drone set if it
    /// has one, else the owner's default, else the global default. A task
    /// spanning entries of more than one job is a contract violation and
    /// fails fast. Tasks with no entries (e.g. an operator-requested
    /// repair) resolve the requesting user's default instead.
    pub fn resolve_scope(
        &self,
        state: &SchedulerState,
        entry_ids: &[EntryId],
        requested_by: Option<&str>,
    ) -> Result<DroneScope, EngineError> {
        if entry_ids.is_empty() {
            return self.scope_for_user(requested_by);
        }

        let job_id = state.require_entry(entry_ids[0])?.job_id;
        let mut job_ids: BTreeSet<JobId> = BTreeSet::new();
        for entry_id in entry_ids {
            job_ids.insert(state.require_entry(*entry_id)?.job_id);
        }
        assert!(
            job_ids.len() == 1,
            "task spans queue entries of multiple jobs: {:?}",
            job_ids
        );

        let job = state.require_job(job_id)?;

        match &job.drone_set {
            Some(name) => self.named_set(name).map(Some),
            None => self.scope_for_user(Some(&job.owner)),
        }
    }

    /// The default scope for a user: their configured set, else the
    /// global default, else unrestricted.
    pub fn scope_for_user(&self, user: Option<&str>) -> Result<DroneScope, EngineError> {
        let name = user
            .and_then(|u| self.user_defaults.get(u))
            .or(self.default_set.as_ref());
        match name {
            Some(name) => self.named_set(name).map(Some),
            None => Ok(None),
        }
    }

    fn named_set(&self, name: &str) -> Result<BTreeSet<String>, EngineError> {
        self.drone_sets
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDroneSet(name.to_string()))
    }

    /// Total process capacity of a scope.
    ///
    /// An empty configured set really does mean zero. With no drones
    /// configured at all, the scheduler is running against a single
    /// implicit drone, so the unrestricted capacity is one drone's worth.
    pub fn capacity(&self, scope: &DroneScope) -> usize {
        match scope {
            Some(set) => self.max_processes_per_drone * set.len(),
            None => self.max_processes_per_drone * self.all_drones.len().max(1),
        }
    }

    /// How many more processes may start for the scope, given what is
    /// already charged against it.
    pub fn max_runnable_processes(&self, scope: &DroneScope, in_use: usize) -> usize {
        self.capacity(scope).saturating_sub(in_use)
    }

    /// Whether two scopes compete for any drone. Unrestricted scopes
    /// compete with everything.
    pub fn scopes_overlap(a: &DroneScope, b: &DroneScope) -> bool {
        match (a, b) {
            (None, _) | (_, None) => true,
            (Some(x), Some(y)) => x.intersection(y).next().is_some(),
        }
    }
}

#[cfg(test)]
#[path = "drone_manager_tests.rs"]
mod tests;
