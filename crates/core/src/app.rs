// SPDX-License-Identifier: MIT

//! Derived, read-only application status (spec §3 `AppStatus`).

use crate::config::AppConfig;
use crate::worker::{WorkerInfo, WorkerState};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    Running,
    Stopped,
    Errored,
    Starting,
}

/// A readable snapshot of an app's current state, derived from its worker set.
#[derive(Debug, Clone)]
pub struct AppStatus {
    pub name: String,
    pub overall: OverallStatus,
    pub workers: Vec<WorkerInfo>,
    pub config: AppConfig,
    pub started_at: Option<Instant>,
}

/// Derive [`OverallStatus`] from a worker set: any `errored` worker makes the
/// app `errored`; otherwise any non-terminal worker makes it `running`
/// (`starting` if none have reached online yet); all-terminal means `stopped`.
pub fn derive_overall_status(workers: &[WorkerInfo]) -> OverallStatus {
    if workers.is_empty() {
        return OverallStatus::Stopped;
    }
    if workers.iter().any(|w| w.state == WorkerState::Errored) {
        return OverallStatus::Errored;
    }
    let any_online = workers.iter().any(|w| w.state == WorkerState::Online);
    let any_live = workers.iter().any(|w| w.state.implies_live_pid() || w.state == WorkerState::Crashed);
    if any_online {
        OverallStatus::Running
    } else if any_live {
        OverallStatus::Starting
    } else {
        OverallStatus::Stopped
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
