// SPDX-License-Identifier: MIT

//! Master <-> worker IPC message shapes (§4.2, §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages a worker sends to the master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Sent once the worker's server has begun accepting traffic.
    Ready,
    /// Seconds since worker start, monotonic.
    Heartbeat { uptime: f64 },
    Metrics { memory: MemoryUsage, cpu: CpuUsage },
    Custom { channel: String, data: Value },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    pub external: u64,
}

/// Absolute, monotonically non-decreasing microsecond counters — not deltas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CpuUsage {
    pub user: u64,
    pub system: u64,
}

/// Messages the master sends to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MasterMessage {
    Shutdown { timeout: u64 },
    Ping,
    CollectMetrics,
    ConfigUpdate { config: Value },
}

/// Validate an incoming worker message's shape beyond what serde already
/// enforces: memory/cpu fields must be representable as non-negative
/// integers, which `u64` already guarantees at the type level, so the
/// remaining validation is purely structural — handled by `serde`'s tagged
/// enum itself. This function exists as the single place C2 calls to decide
/// whether a raw frame is one of the four accepted types; anything that
/// fails to deserialize as `WorkerMessage` is logged and dropped by the
/// caller, never treated as fatal.
pub fn parse_worker_message(raw: &[u8]) -> Option<WorkerMessage> {
    serde_json::from_slice(raw).ok()
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
