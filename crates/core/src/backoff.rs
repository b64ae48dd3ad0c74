// SPDX-License-Identifier: MIT

//! Crash-recovery backoff and restart-budget tracking (C4).

use crate::config::{BackoffPolicy, RestartPolicy};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Per-worker backoff bookkeeping (spec §3 `BackoffState`).
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub attempt: u32,
    pub next_delay_ms: u64,
    /// Restart timestamps within the current `maxRestartWindow`, oldest first.
    window: VecDeque<Instant>,
}

impl BackoffState {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self { attempt: 0, next_delay_ms: policy.initial_ms, window: VecDeque::new() }
    }

    /// Cancel a scheduled restart without consuming an attempt (used when a
    /// stop request arrives during the backoff delay).
    pub fn reset(&mut self, policy: &BackoffPolicy) {
        self.attempt = 0;
        self.next_delay_ms = policy.initial_ms;
    }
}

/// Outcome of [`on_exit`]: either a scheduled restart after `delay`, or the
/// restart budget has been exhausted and the worker must become `errored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Restart { delay: Duration },
    BudgetExhausted,
}

/// Implements the `onExit` pseudocode from spec §4.4 exactly.
///
/// `uptime` is the worker's uptime at the moment it exited; `now` is used to
/// record the restart timestamp and to prune the sliding window.
pub fn on_exit(
    backoff: &mut BackoffState,
    consecutive_crashes: &mut u32,
    restart: &RestartPolicy,
    policy: &BackoffPolicy,
    uptime: Duration,
    now: Instant,
) -> ExitOutcome {
    if uptime.as_millis() as u64 >= restart.min_uptime_ms {
        *consecutive_crashes = 0;
        backoff.reset(policy);
    } else {
        *consecutive_crashes += 1;
    }

    let window_len = Duration::from_millis(restart.max_restart_window_ms);
    backoff.window.push_back(now);
    while let Some(&front) = backoff.window.front() {
        if now.saturating_duration_since(front) > window_len {
            backoff.window.pop_front();
        } else {
            break;
        }
    }

    if backoff.window.len() > restart.max_restarts as usize {
        return ExitOutcome::BudgetExhausted;
    }

    let delay_ms =
        (policy.initial_ms as f64 * policy.multiplier.powi(backoff.attempt as i32)).min(policy.max_ms as f64);
    backoff.attempt += 1;
    backoff.next_delay_ms = delay_ms as u64;
    ExitOutcome::Restart { delay: Duration::from_millis(delay_ms as u64) }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
