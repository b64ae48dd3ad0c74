// SPDX-License-Identifier: MIT

use super::*;
use crate::worker::{SlotIndex, WorkerId};

fn worker_in(state: WorkerState) -> WorkerInfo {
    let mut w = WorkerInfo::new(WorkerId(0), SlotIndex(0));
    w.state = state;
    w
}

#[test]
fn empty_workers_is_stopped() {
    assert_eq!(derive_overall_status(&[]), OverallStatus::Stopped);
}

#[test]
fn any_errored_dominates() {
    let workers = vec![worker_in(WorkerState::Online), worker_in(WorkerState::Errored)];
    assert_eq!(derive_overall_status(&workers), OverallStatus::Errored);
}

#[test]
fn any_online_is_running() {
    let workers = vec![worker_in(WorkerState::Starting), worker_in(WorkerState::Online)];
    assert_eq!(derive_overall_status(&workers), OverallStatus::Running);
}

#[test]
fn spawning_without_online_is_starting() {
    let workers = vec![worker_in(WorkerState::Spawning)];
    assert_eq!(derive_overall_status(&workers), OverallStatus::Starting);
}

#[test]
fn all_stopped_is_stopped() {
    let workers = vec![worker_in(WorkerState::Stopped), worker_in(WorkerState::Stopped)];
    assert_eq!(derive_overall_status(&workers), OverallStatus::Stopped);
}
