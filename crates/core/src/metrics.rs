// SPDX-License-Identifier: MIT

//! Metrics aggregation: CPU percentage derivation from absolute samples (C7).

use crate::worker::MetricsSample;
use std::time::Instant;

/// A sample paired with the wall-clock instant it was taken.
#[derive(Debug, Clone, Copy)]
pub struct TimedSample {
    pub sample: MetricsSample,
    pub at: Instant,
}

/// Derive CPU percentage from two consecutive absolute samples, per spec §4.7:
/// `((user2+system2) - (user1+system1)) / ((t2-t1) * 1e4)`, a 0-100 scale
/// across one core. Returns `0.0` when there is no prior sample, or when the
/// elapsed time is non-positive (clock didn't advance).
pub fn cpu_pct(previous: Option<TimedSample>, current: TimedSample) -> f64 {
    let Some(previous) = previous else {
        return 0.0;
    };
    let elapsed_ms = current.at.saturating_duration_since(previous.at).as_millis() as f64;
    if elapsed_ms <= 0.0 {
        return 0.0;
    }
    let delta_us = (current.sample.cpu_user_us + current.sample.cpu_system_us) as f64
        - (previous.sample.cpu_user_us + previous.sample.cpu_system_us) as f64;
    (delta_us / (elapsed_ms * 1e4)).max(0.0)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
