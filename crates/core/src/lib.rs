// SPDX-License-Identifier: MIT

//! sv-core: lifecycle state machine, crash-recovery policy, and the
//! validated data model shared across the supervisor.

pub mod app;
pub mod backoff;
pub mod config;
pub mod error;
pub mod metrics;
pub mod worker;

pub use app::{derive_overall_status, AppStatus, OverallStatus};
pub use backoff::{on_exit, BackoffState, ExitOutcome};
pub use config::{
    AppConfig, BackoffPolicy, ClusterStrategyKind, ClusteringConfig, HealthCheckConfig, InstanceCount,
    RestartPolicy, RollingRestartConfig, ShutdownPolicy, ShutdownSignal,
};
pub use error::{Result, SupervisorError};
pub use metrics::{cpu_pct, TimedSample};
pub use worker::{transition, MetricsSample, SlotIndex, WorkerId, WorkerInfo, WorkerState};

/// Compile-time constant: the base of the internal port range used by the
/// `proxy` cluster strategy (spec §9 glossary / §4.9).
pub const INTERNAL_PORT_BASE: u16 = 40_001;
