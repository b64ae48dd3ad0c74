// SPDX-License-Identifier: MIT

//! Worker identity, lifecycle state machine (C3), and per-worker bookkeeping.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::Instant;

use crate::error::SupervisorError;

/// Unique identifier for a worker instance.
///
/// Monotonically increasing per app: a worker replacing a crashed or
/// reloaded slot occupant always gets a fresh id, never reuses one, so the
/// proxy can distinguish "slot reused" from "new worker" (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<u64> for WorkerId {
    fn borrow(&self) -> &u64 {
        &self.0
    }
}

/// A stable index in `[0, instances)` identifying the logical position a
/// worker occupies within an app (spec §3 invariant I4 / glossary "Slot").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotIndex(pub usize);

/// Tagged lifecycle state of a worker. Transitions are validated by
/// [`transition`]; no other path may mutate [`WorkerInfo::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Spawning,
    Starting,
    Online,
    Draining,
    Stopping,
    Stopped,
    Crashed,
    Errored,
}

impl WorkerState {
    /// The valid-transition table from spec §3. Any pair not listed here is
    /// a programmer error and must be rejected by [`transition`].
    pub fn can_transition_to(self, to: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, to),
            (Spawning, Starting)
                | (Spawning, Crashed)
                | (Spawning, Errored)
                | (Spawning, Stopped)
                | (Starting, Online)
                | (Starting, Crashed)
                | (Starting, Errored)
                | (Starting, Stopped)
                | (Online, Draining)
                | (Online, Stopping)
                | (Online, Crashed)
                | (Online, Errored)
                | (Draining, Stopping)
                | (Draining, Stopped)
                | (Draining, Crashed)
                | (Stopping, Stopped)
                | (Stopping, Crashed)
                | (Stopped, Spawning)
                | (Crashed, Spawning)
                | (Crashed, Stopped)
                | (Errored, Stopped)
        )
    }

    /// True while a live OS pid may legally be associated with this state
    /// (invariant I1).
    pub fn implies_live_pid(self) -> bool {
        use WorkerState::*;
        matches!(self, Spawning | Starting | Online | Draining | Stopping)
    }
}

/// Snapshot of a worker's recorded CPU/memory sample (feeds C7).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricsSample {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external: u64,
    /// Absolute, monotonically non-decreasing microsecond counter.
    pub cpu_user_us: u64,
    /// Absolute, monotonically non-decreasing microsecond counter.
    pub cpu_system_us: u64,
}

/// Per-worker state tracked by the master (spec §3 `WorkerInfo`).
#[derive(Debug, Clone)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub slot: SlotIndex,
    pub pid: Option<u32>,
    pub state: WorkerState,
    pub started_at: Option<Instant>,
    pub ready_at: Option<Instant>,
    pub stopped_at: Option<Instant>,
    pub restart_count: u32,
    pub consecutive_crashes: u32,
    pub last_crash_at: Option<Instant>,
    pub last_exit_code: Option<i32>,
    pub last_signal: Option<i32>,
    pub last_metrics: Option<MetricsSample>,
    pub last_metrics_at: Option<Instant>,
    pub last_heartbeat: Option<Instant>,
}

impl WorkerInfo {
    pub fn new(id: WorkerId, slot: SlotIndex) -> Self {
        Self {
            id,
            slot,
            pid: None,
            state: WorkerState::Spawning,
            started_at: None,
            ready_at: None,
            stopped_at: None,
            restart_count: 0,
            consecutive_crashes: 0,
            last_crash_at: None,
            last_exit_code: None,
            last_signal: None,
            last_metrics: None,
            last_metrics_at: None,
            last_heartbeat: None,
        }
    }

    /// Uptime since this worker's current incarnation started, or zero if
    /// it never reached `started_at`.
    pub fn uptime(&self, now: Instant) -> std::time::Duration {
        self.started_at.map(|s| now.saturating_duration_since(s)).unwrap_or_default()
    }

    /// Proxy slot-aliveness is true only while online (invariant I5).
    pub fn is_alive_for_proxy(&self) -> bool {
        self.state == WorkerState::Online
    }
}

/// Apply a validated state transition, updating `state`, `ready_at`, and
/// `stopped_at` as side effects. No other mutation happens here (C3).
pub fn transition(info: &mut WorkerInfo, to: WorkerState, now: Instant) -> Result<(), SupervisorError> {
    if !info.state.can_transition_to(to) {
        return Err(SupervisorError::InvalidTransition {
            worker: info.id.to_string(),
            from: info.state,
            to,
        });
    }
    if to == WorkerState::Online {
        // Invariant I2: ready_at is set the first time a worker reaches
        // online, and is never cleared except by replacement with a fresh id.
        if info.ready_at.is_none() {
            info.ready_at = Some(now);
        }
    }
    if matches!(to, WorkerState::Stopped | WorkerState::Crashed) {
        info.stopped_at = Some(now);
    }
    info.state = to;
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
