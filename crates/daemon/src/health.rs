// SPDX-License-Identifier: MIT

//! Health checker (C6): heartbeat-timeout tracking and optional HTTP probing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sv_core::{HealthCheckConfig, WorkerId};

use crate::env::{default_heartbeat_interval, DEFAULT_HEARTBEAT_MISS_THRESHOLD};

/// Per-worker heartbeat bookkeeping, independent of HTTP probing.
#[derive(Debug, Default)]
pub struct HeartbeatTracker {
    last_seen: HashMap<WorkerId, Instant>,
}

impl HeartbeatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, worker: WorkerId, at: Instant) {
        self.last_seen.insert(worker, at);
    }

    pub fn forget(&mut self, worker: WorkerId) {
        self.last_seen.remove(&worker);
    }

    /// True if `worker` has missed `heartbeatInterval * missThreshold` since
    /// its last heartbeat, or has never sent one since being tracked.
    pub fn is_unhealthy(&self, worker: WorkerId, now: Instant) -> bool {
        let interval = default_heartbeat_interval();
        let window = interval * DEFAULT_HEARTBEAT_MISS_THRESHOLD;
        match self.last_seen.get(&worker) {
            Some(last) => now.saturating_duration_since(*last) > window,
            None => false,
        }
    }
}

/// Per-worker consecutive-failure counter for the optional HTTP probe.
#[derive(Debug, Default)]
pub struct ProbeTracker {
    consecutive_failures: HashMap<WorkerId, u32>,
}

impl ProbeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forget(&mut self, worker: WorkerId) {
        self.consecutive_failures.remove(&worker);
    }

    /// Issue a GET to `http://127.0.0.1:{port}{path}` and update the
    /// worker's consecutive-failure count. Returns `true` once the count
    /// reaches `unhealthy_threshold` (caller should request a restart).
    pub async fn probe(&mut self, worker: WorkerId, port: u16, cfg: &HealthCheckConfig) -> bool {
        let url = format!("http://127.0.0.1:{port}{}", cfg.path);
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let client = reqwest::Client::new();
        let ok = match tokio::time::timeout(timeout, client.get(&url).send()).await {
            Ok(Ok(resp)) => resp.status().is_success(),
            _ => false,
        };

        if ok {
            self.consecutive_failures.remove(&worker);
            false
        } else {
            let count = self.consecutive_failures.entry(worker).or_insert(0);
            *count += 1;
            *count >= cfg.unhealthy_threshold
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
