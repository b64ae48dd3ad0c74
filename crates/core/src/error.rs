// SPDX-License-Identifier: MIT

//! Error taxonomy shared across the supervisor (spec §7).

use crate::worker::WorkerState;
use thiserror::Error;

/// Distinct error tags the implementation must surface, per the error
/// handling design in the specification.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Validation produced an invalid `AppConfig` (raised by the external
    /// validator; surfaces through `start`).
    #[error("invalid config for app `{name}`: {reason}")]
    ConfigError { name: String, reason: String },

    /// Named app/worker does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate `startApp` for a live name.
    #[error("app `{0}` already exists")]
    AlreadyExists(String),

    /// FSM programmer error: a transition not present in the valid-transition table.
    #[error("invalid transition for worker {worker}: {from:?} -> {to:?}")]
    InvalidTransition { worker: String, from: WorkerState, to: WorkerState },

    /// Worker did not emit `ready` within `readyTimeout`.
    #[error("worker {0} did not become ready in time")]
    ReadyTimeout(String),

    /// C4 exceeded `maxRestarts` in `maxRestartWindow`.
    #[error("restart budget exhausted for worker {0}")]
    RestartBudgetExhausted(String),

    /// At least one batch of a rolling reload failed; rollback applied.
    #[error("reload of app `{0}` failed: {1}")]
    ReloadFailed(String, String),

    /// Socket/file/process syscall failed.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Control client could not reach the master.
    #[error("supervisor unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
