// SPDX-License-Identifier: MIT

//! Metrics aggregator (C7): per-worker last-sample store feeding CPU % derivation.

use std::collections::HashMap;
use std::time::Instant;

use sv_core::{cpu_pct, MetricsSample, TimedSample, WorkerId};

/// Holds the previous raw sample per worker so each new `metrics` IPC can be
/// turned into a CPU percentage via [`sv_core::cpu_pct`] (spec §4.7).
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    previous: HashMap<WorkerId, TimedSample>,
}

/// A derived snapshot ready for `getAppStatus`/`status` command consumers.
#[derive(Debug, Clone, Copy)]
pub struct DerivedSample {
    pub memory: MetricsSample,
    pub cpu_pct: f64,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new raw sample for `worker` and return the derived CPU
    /// percentage plus the memory figures as-sampled. The first sample for a
    /// worker always yields `cpu_pct = 0.0`.
    pub fn record(&mut self, worker: WorkerId, sample: MetricsSample, at: Instant) -> DerivedSample {
        let current = TimedSample { sample, at };
        let previous = self.previous.get(&worker).copied();
        let pct = cpu_pct(previous, current);
        self.previous.insert(worker, current);
        DerivedSample { memory: sample, cpu_pct: pct }
    }

    /// Drop a worker's history, e.g. once it is replaced by a fresh id.
    pub fn forget(&mut self, worker: WorkerId) {
        self.previous.remove(&worker);
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
