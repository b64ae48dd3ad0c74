// SPDX-License-Identifier: MIT

//! Reload coordinator (C10): batch planning for zero-downtime rolling restarts.
//!
//! This module holds the pure, easily-tested planning logic; the actual
//! kill/spawn/wait-for-ready orchestration runs inside the owning app actor
//! (`orchestrator.rs`) so it stays on the single ordering domain spec §5
//! requires.

use sv_core::SlotIndex;

/// Split an app's slots into fixed-size batches, in slot order, for a
/// rolling restart (spec §4.10 step 1). A `batch_size` of zero is treated as
/// one (an empty batch would stall the reload forever).
pub fn plan_batches(slots: &[SlotIndex], batch_size: usize) -> Vec<Vec<SlotIndex>> {
    slots.chunks(batch_size.max(1)).map(<[SlotIndex]>::to_vec).collect()
}

/// Whether a reload may proceed for an app that may already have one running.
///
/// Spec §4.10: "Concurrent reload requests for the same app are serialized;
/// a reload in progress rejects a second reload for that app until
/// completion." Kept as a guard type rather than a bare bool so the intent
/// reads at call sites.
#[derive(Debug, Default)]
pub struct ReloadGuard {
    in_progress: bool,
}

impl ReloadGuard {
    /// Attempt to begin a reload. Returns `false` if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.in_progress {
            return false;
        }
        self.in_progress = true;
        true
    }

    pub fn finish(&mut self) {
        self.in_progress = false;
    }
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
