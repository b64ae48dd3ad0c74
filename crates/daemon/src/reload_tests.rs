// SPDX-License-Identifier: MIT

use super::*;

fn slots(n: usize) -> Vec<SlotIndex> {
    (0..n).map(SlotIndex).collect()
}

#[test]
fn batches_split_evenly() {
    let batches = plan_batches(&slots(6), 2);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0], vec![SlotIndex(0), SlotIndex(1)]);
}

#[test]
fn uneven_split_leaves_a_short_final_batch() {
    let batches = plan_batches(&slots(5), 2);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2], vec![SlotIndex(4)]);
}

#[test]
fn zero_batch_size_is_treated_as_one() {
    let batches = plan_batches(&slots(3), 0);
    assert_eq!(batches.len(), 3);
}

#[test]
fn reload_guard_rejects_concurrent_reload() {
    let mut guard = ReloadGuard::default();
    assert!(guard.begin());
    assert!(!guard.begin());
    guard.finish();
    assert!(guard.begin());
}
