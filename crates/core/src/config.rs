// SPDX-License-Identifier: MIT

//! `AppConfig` and the policy sub-structures it carries (spec §3).
//!
//! Schema validation itself is an external collaborator (spec §1); this
//! module only defines the validated shape and its `serde` representation,
//! since the daemon still needs to deserialize *something* off disk.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

/// Either a fixed instance count or the `max` token resolved to CPU count.
///
/// Serializes as a bare JSON number for `Fixed`, or the string `"max"` for
/// `Max` — a plain `#[serde(untagged)]` enum can't express this, since an
/// untagged unit variant only matches `null`, not a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceCount {
    Fixed(u32),
    Max,
}

impl InstanceCount {
    /// Resolve against a CPU count (as the `max` token would be resolved by
    /// the daemon at `startApp` time).
    pub fn resolve(&self, cpu_count: u32) -> u32 {
        match self {
            InstanceCount::Fixed(n) => (*n).max(1),
            InstanceCount::Max => cpu_count.max(1),
        }
    }
}

impl Serialize for InstanceCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            InstanceCount::Fixed(n) => serializer.serialize_u32(*n),
            InstanceCount::Max => serializer.serialize_str("max"),
        }
    }
}

impl<'de> Deserialize<'de> for InstanceCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct InstanceCountVisitor;

        impl Visitor<'_> for InstanceCountVisitor {
            type Value = InstanceCount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an instance count (a positive integer or the string \"max\")")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                u32::try_from(v).map(InstanceCount::Fixed).map_err(|_| E::custom("instance count out of range"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                u32::try_from(v).map(InstanceCount::Fixed).map_err(|_| E::custom("instance count out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                if v.eq_ignore_ascii_case("max") {
                    Ok(InstanceCount::Max)
                } else {
                    Err(E::custom(format!("expected a number or \"max\", got {v:?}")))
                }
            }
        }

        deserializer.deserialize_any(InstanceCountVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownSignal {
    #[serde(rename = "SIGTERM")]
    Sigterm,
    #[serde(rename = "SIGINT")]
    Sigint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub max_restart_window_ms: u64,
    pub min_uptime_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self { max_restarts: 10, max_restart_window_ms: 60_000, min_uptime_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownPolicy {
    #[serde(default = "default_shutdown_signal")]
    pub signal: ShutdownSignal,
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

fn default_shutdown_signal() -> ShutdownSignal {
    ShutdownSignal::Sigterm
}
fn default_kill_timeout_ms() -> u64 {
    3_000
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self { signal: default_shutdown_signal(), kill_timeout_ms: default_kill_timeout_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_ms: 1_000, multiplier: 2.0, max_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
}

fn default_health_path() -> String {
    "/".to_string()
}
fn default_health_timeout_ms() -> u64 {
    2_000
}
fn default_unhealthy_threshold() -> u32 {
    3
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_health_path(),
            timeout_ms: default_health_timeout_ms(),
            unhealthy_threshold: default_unhealthy_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClusterStrategyKind {
    Auto,
    ReusePort,
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingRestartConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_batch_size() -> usize {
    1
}
fn default_batch_delay_ms() -> u64 {
    0
}

impl Default for RollingRestartConfig {
    fn default() -> Self {
        Self { batch_size: default_batch_size(), batch_delay_ms: default_batch_delay_ms() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_strategy")]
    pub strategy: ClusterStrategyKind,
    #[serde(default)]
    pub rolling_restart: RollingRestartConfig,
}

fn default_strategy() -> ClusterStrategyKind {
    ClusterStrategyKind::Auto
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { enabled: false, strategy: default_strategy(), rolling_restart: RollingRestartConfig::default() }
    }
}

/// Immutable, already-validated application configuration (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub script: PathBuf,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default = "default_instances")]
    pub instances: InstanceCount,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(default)]
    pub backoff: BackoffPolicy,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
    #[serde(default)]
    pub clustering: Option<ClusteringConfig>,
    /// When `false`, C4 never reschedules a respawn after any exit.
    #[serde(default = "default_true")]
    pub autorestart: bool,
}

fn default_instances() -> InstanceCount {
    InstanceCount::Fixed(1)
}
fn default_ready_timeout_ms() -> u64 {
    5_000
}

impl AppConfig {
    pub fn clustering_enabled(&self) -> bool {
        self.clustering.as_ref().is_some_and(|c| c.enabled)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
