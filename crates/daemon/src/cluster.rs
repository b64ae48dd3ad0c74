// SPDX-License-Identifier: MIT

//! Cluster strategy (C9): `reusePort` vs `proxy` selection and worker env vending.

use std::collections::HashMap;

use sv_core::{ClusterStrategyKind, WorkerId, INTERNAL_PORT_BASE};

/// The two concrete strategies a resolved `auto` can become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ReusePort,
    Proxy,
}

/// `auto` resolves to `ReusePort` on Linux, `Proxy` everywhere else (spec §4.9).
pub fn detect_strategy(kind: ClusterStrategyKind) -> Strategy {
    match kind {
        ClusterStrategyKind::ReusePort => Strategy::ReusePort,
        ClusterStrategyKind::Proxy => Strategy::Proxy,
        ClusterStrategyKind::Auto => {
            if cfg!(target_os = "linux") {
                Strategy::ReusePort
            } else {
                Strategy::Proxy
            }
        }
    }
}

/// The env vars a strategy contributes for a given worker/port, layered
/// beneath the app's own `env` overlay by the process manager (spec §4.9).
///
/// `clustering_enabled` gates the internal-port override: a multi-instance
/// app without explicit `clustering.enabled = true` keeps the configured
/// public port even under the `Proxy` strategy (spec §4.9 Policy).
pub fn worker_env(
    strategy: Strategy,
    worker_id: WorkerId,
    public_port: Option<u16>,
    clustering_enabled: bool,
) -> HashMap<String, String> {
    let mut env = HashMap::new();
    match strategy {
        Strategy::ReusePort => {
            if let Some(port) = public_port {
                env.insert("PORT".to_string(), port.to_string());
            }
            env.insert("REUSE_PORT".to_string(), "1".to_string());
        }
        Strategy::Proxy => {
            let port = if clustering_enabled {
                INTERNAL_PORT_BASE + worker_id.0 as u16
            } else {
                public_port.unwrap_or(INTERNAL_PORT_BASE + worker_id.0 as u16)
            };
            env.insert("PORT".to_string(), port.to_string());
            env.insert("REUSE_PORT".to_string(), "0".to_string());
        }
    }
    env
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod tests;
