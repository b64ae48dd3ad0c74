// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn untracked_worker_is_never_unhealthy() {
    let tracker = HeartbeatTracker::new();
    assert!(!tracker.is_unhealthy(WorkerId(0), Instant::now()));
}

#[test]
fn recent_heartbeat_is_healthy() {
    let mut tracker = HeartbeatTracker::new();
    tracker.record(WorkerId(0), Instant::now());
    assert!(!tracker.is_unhealthy(WorkerId(0), Instant::now()));
}

#[test]
fn stale_heartbeat_past_miss_threshold_is_unhealthy() {
    let mut tracker = HeartbeatTracker::new();
    let t0 = Instant::now();
    tracker.record(WorkerId(0), t0);
    let later = t0 + default_heartbeat_interval() * (DEFAULT_HEARTBEAT_MISS_THRESHOLD + 1);
    assert!(tracker.is_unhealthy(WorkerId(0), later));
}

#[test]
fn forgetting_a_worker_clears_its_heartbeat_state() {
    let mut tracker = HeartbeatTracker::new();
    let t0 = Instant::now();
    tracker.record(WorkerId(0), t0);
    tracker.forget(WorkerId(0));
    let later = t0 + default_heartbeat_interval() * (DEFAULT_HEARTBEAT_MISS_THRESHOLD + 1);
    assert!(!tracker.is_unhealthy(WorkerId(0), later));
}

#[tokio::test]
async fn probe_failure_increments_until_threshold() {
    let mut tracker = ProbeTracker::new();
    let cfg = HealthCheckConfig {
        enabled: true,
        path: "/".to_string(),
        timeout_ms: 50,
        unhealthy_threshold: 2,
    };
    // Nothing listens on this port, so every probe fails.
    let port = 1u16;
    assert!(!tracker.probe(WorkerId(0), port, &cfg).await);
    assert!(tracker.probe(WorkerId(0), port, &cfg).await);
}
