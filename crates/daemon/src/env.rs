// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;
use std::time::Duration;

/// Unix domain socket path for the control server.
/// `SUPERVISOR_IPC_SOCKET` > `XDG_RUNTIME_DIR/supervisor.sock` > `~/.local/state/supervisor/supervisor.sock`.
pub fn ipc_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("SUPERVISOR_IPC_SOCKET") {
        return PathBuf::from(path);
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("supervisor.sock");
    }
    state_dir().join("supervisor.sock")
}

/// Resolve state directory: `SUPERVISOR_STATE_DIR` > `XDG_STATE_HOME/supervisor` > `~/.local/state/supervisor`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SUPERVISOR_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("supervisor");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".local/state/supervisor")
}

/// Prefix identifying master-only env keys that must never reach a worker (spec §6, P7).
pub const MASTER_ENV_PREFIX: &str = "SUPERVISOR_";

/// Shutdown drain timeout applied by the control server when no app-specific
/// kill policy applies (e.g. waiting for streaming handlers to finish).
pub fn drain_timeout() -> Duration {
    std::env::var("SUPERVISOR_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Interval at which the health checker scans for missed heartbeats and
/// polls HTTP probes.
pub fn health_tick_interval() -> Duration {
    std::env::var("SUPERVISOR_HEALTH_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(1))
}

/// Default heartbeat interval the health checker assumes a worker SDK uses,
/// absent a per-app override (spec §4.6).
pub fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

/// Default miss threshold before a worker is declared unhealthy on heartbeat grounds.
pub const DEFAULT_HEARTBEAT_MISS_THRESHOLD: u32 = 3;
