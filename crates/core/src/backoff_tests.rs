// SPDX-License-Identifier: MIT

use super::*;
use crate::config::{BackoffPolicy, RestartPolicy};

fn policies() -> (RestartPolicy, BackoffPolicy) {
    (
        RestartPolicy { max_restarts: 3, max_restart_window_ms: 60_000, min_uptime_ms: 30_000 },
        BackoffPolicy { initial_ms: 1_000, multiplier: 2.0, max_ms: 30_000 },
    )
}

#[test]
fn crash_and_recover_scenario_matches_spec_example() {
    let (restart, backoff_cfg) = policies();
    let mut backoff = BackoffState::new(&backoff_cfg);
    let mut consecutive = 0u32;
    let start = Instant::now();
    let short_uptime = Duration::from_secs(2);

    let mut restart_count = 0;
    let mut outcome = None;
    for i in 0..4 {
        let now = start + Duration::from_millis(i * 100);
        let o = on_exit(&mut backoff, &mut consecutive, &restart, &backoff_cfg, short_uptime, now);
        if matches!(o, ExitOutcome::Restart { .. }) {
            restart_count += 1;
        }
        outcome = Some(o);
    }

    assert_eq!(restart_count, 3, "first 3 crashes should schedule restarts");
    assert_eq!(outcome, Some(ExitOutcome::BudgetExhausted), "4th crash exhausts the budget");
}

#[test]
fn delays_follow_exponential_schedule() {
    let (restart, backoff_cfg) = policies();
    let mut backoff = BackoffState::new(&backoff_cfg);
    let mut consecutive = 0u32;
    let start = Instant::now();

    let mut delays = Vec::new();
    for i in 0..3 {
        let now = start + Duration::from_millis(i * 10);
        if let ExitOutcome::Restart { delay } = on_exit(
            &mut backoff,
            &mut consecutive,
            &restart,
            &backoff_cfg,
            Duration::from_secs(2),
            now,
        ) {
            delays.push(delay.as_millis() as u64);
        }
    }

    assert_eq!(delays, vec![1_000, 2_000, 4_000]);
}

#[test]
fn delay_caps_at_max() {
    let restart = RestartPolicy { max_restarts: 100, max_restart_window_ms: 60_000, min_uptime_ms: 30_000 };
    let backoff_cfg = BackoffPolicy { initial_ms: 1_000, multiplier: 10.0, max_ms: 5_000 };
    let mut backoff = BackoffState::new(&backoff_cfg);
    let mut consecutive = 0u32;
    let start = Instant::now();

    for i in 0..3 {
        let now = start + Duration::from_millis(i * 10);
        on_exit(&mut backoff, &mut consecutive, &restart, &backoff_cfg, Duration::from_secs(0), now);
    }
    assert_eq!(backoff.next_delay_ms, 5_000);
}

#[test]
fn uptime_above_min_resets_consecutive_crashes_and_backoff() {
    let (restart, backoff_cfg) = policies();
    let mut backoff = BackoffState::new(&backoff_cfg);
    let mut consecutive = 0u32;
    let start = Instant::now();

    on_exit(&mut backoff, &mut consecutive, &restart, &backoff_cfg, Duration::from_secs(1), start);
    assert_eq!(consecutive, 1);

    let long_uptime = Duration::from_secs(60);
    on_exit(&mut backoff, &mut consecutive, &restart, &backoff_cfg, long_uptime, start + Duration::from_secs(1));
    assert_eq!(consecutive, 0);
    assert_eq!(backoff.attempt, 1, "reset rewinds attempt counter before the next scheduled restart");
}

#[test]
fn restart_budget_property_never_exceeds_max_plus_one_spawns_per_window() {
    let restart = RestartPolicy { max_restarts: 5, max_restart_window_ms: 10_000, min_uptime_ms: 30_000 };
    let backoff_cfg = BackoffPolicy::default();
    let mut backoff = BackoffState::new(&backoff_cfg);
    let mut consecutive = 0u32;
    let start = Instant::now();

    let mut restarts_in_window = 0;
    for i in 0..20 {
        let now = start + Duration::from_millis(i * 100);
        match on_exit(&mut backoff, &mut consecutive, &restart, &backoff_cfg, Duration::from_secs(0), now) {
            ExitOutcome::Restart { .. } => restarts_in_window += 1,
            ExitOutcome::BudgetExhausted => break,
        }
    }
    assert!(restarts_in_window <= restart.max_restarts as usize);
}
