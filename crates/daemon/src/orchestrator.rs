// SPDX-License-Identifier: MIT

//! Master orchestrator (C11): per-app state, public operations, fan-out.
//!
//! Each app owns exactly one actor task holding its `WorkerInfo` set; every
//! mutation — FSM transitions, spawn/kill, backoff scheduling, reload step
//! advancement — is funneled through that actor's mailbox, satisfying the
//! single ordering domain spec §5 requires.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sv_core::{
    derive_overall_status, on_exit, transition, AppConfig, AppStatus, BackoffState, ExitOutcome,
    Result, SlotIndex, SupervisorError, WorkerId, WorkerInfo, WorkerState,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use crate::cluster::{self, Strategy};
use crate::env;
use crate::health::{HeartbeatTracker, ProbeTracker};
use crate::metrics::MetricsAggregator;
use crate::process::{self, ExitInfo, KillOutcome};
use crate::proxy::{self, ProxyHandle};
use crate::reload::{plan_batches, ReloadGuard};

/// Public entry point shared by the control server's command handlers and
/// the signal hub.
#[derive(Clone)]
pub struct Orchestrator {
    apps: Arc<Mutex<HashMap<String, AppHandle>>>,
    ipc_dir: PathBuf,
}

#[derive(Clone)]
struct AppHandle {
    cmd_tx: mpsc::UnboundedSender<AppCommand>,
}

enum AppCommand {
    Stop(oneshot::Sender<Result<()>>),
    Restart(oneshot::Sender<Result<()>>),
    Reload(oneshot::Sender<Result<()>>),
    Delete(oneshot::Sender<Result<()>>),
    Status(oneshot::Sender<AppStatus>),
    Shutdown(oneshot::Sender<()>),
    SubscribeLogs(oneshot::Sender<broadcast::Receiver<LogLine>>),
    SubscribeMetrics(oneshot::Sender<broadcast::Receiver<MetricsUpdate>>),
}

/// One captured stdio line, broadcast to `logs` stream subscribers.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub worker: WorkerId,
    pub stream: process::StdioStream,
    pub line: String,
}

/// One derived metrics sample, broadcast to `metrics` stream subscribers.
#[derive(Debug, Clone, Copy)]
pub struct MetricsUpdate {
    pub worker: WorkerId,
    pub memory: sv_core::MetricsSample,
    pub cpu_pct: f64,
}

impl Orchestrator {
    pub fn new(ipc_dir: PathBuf) -> Self {
        Self { apps: Arc::new(Mutex::new(HashMap::new())), ipc_dir }
    }

    pub async fn start_app(&self, cfg: AppConfig) -> Result<()> {
        let name = cfg.name.clone();
        {
            let apps = self.apps.lock();
            if apps.contains_key(&name) {
                return Err(SupervisorError::AlreadyExists(name));
            }
        }

        let cpu_count = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
        let instances = cfg.instances.resolve(cpu_count);
        let strategy = cluster::detect_strategy(
            cfg.clustering.as_ref().map(|c| c.strategy).unwrap_or(sv_core::ClusterStrategyKind::Auto),
        );

        let proxy = if cfg.clustering_enabled() && strategy == Strategy::Proxy {
            match cfg.port {
                Some(port) => Some(proxy::spawn(port).await.map_err(SupervisorError::IoError)?),
                None => None,
            }
        } else {
            None
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.apps.lock().insert(name.clone(), AppHandle { cmd_tx });

        let mut actor = AppActor::new(cfg, strategy, proxy, self.ipc_dir.clone());
        let apps_for_cleanup = Arc::clone(&self.apps);
        let name_for_cleanup = name.clone();
        tokio::spawn(async move {
            actor.run(cmd_rx, instances).await;
            apps_for_cleanup.lock().remove(&name_for_cleanup);
        });

        Ok(())
    }

    pub async fn stop_app(&self, name: &str) -> Result<()> {
        self.call(name, AppCommand::Stop).await
    }

    pub async fn restart_app(&self, name: &str) -> Result<()> {
        self.call(name, AppCommand::Restart).await
    }

    pub async fn reload_app(&self, name: &str) -> Result<()> {
        self.call(name, AppCommand::Reload).await
    }

    pub async fn delete_app(&self, name: &str) -> Result<()> {
        self.call(name, AppCommand::Delete).await
    }

    pub async fn reload_all(&self) -> Vec<(String, Result<()>)> {
        let names: Vec<String> = self.apps.lock().keys().cloned().collect();
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = self.reload_app(&name).await;
            results.push((name, result));
        }
        results
    }

    pub async fn list_apps(&self) -> Vec<AppStatus> {
        let names: Vec<String> = self.apps.lock().keys().cloned().collect();
        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            if let Ok(status) = self.get_app_status(&name).await {
                statuses.push(status);
            }
        }
        statuses
    }

    pub async fn get_app_status(&self, name: &str) -> Result<AppStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(name, AppCommand::Status(tx))?;
        rx.await.map_err(|_| SupervisorError::NotFound(name.to_string()))
    }

    pub async fn subscribe_logs(&self, name: &str) -> Result<broadcast::Receiver<LogLine>> {
        let (tx, rx) = oneshot::channel();
        self.send(name, AppCommand::SubscribeLogs(tx))?;
        rx.await.map_err(|_| SupervisorError::NotFound(name.to_string()))
    }

    pub async fn subscribe_metrics(&self, name: &str) -> Result<broadcast::Receiver<MetricsUpdate>> {
        let (tx, rx) = oneshot::channel();
        self.send(name, AppCommand::SubscribeMetrics(tx))?;
        rx.await.map_err(|_| SupervisorError::NotFound(name.to_string()))
    }

    /// Stop every app in parallel, each with its own kill policy. Idempotent:
    /// an app whose actor has already exited is simply absent from the map.
    pub async fn shutdown(&self) {
        let handles: Vec<AppHandle> = self.apps.lock().values().cloned().collect();
        let waits: Vec<_> = handles
            .into_iter()
            .map(|handle| {
                tokio::spawn(async move {
                    let (tx, rx) = oneshot::channel();
                    if handle.cmd_tx.send(AppCommand::Shutdown(tx)).is_ok() {
                        let _ = rx.await;
                    }
                })
            })
            .collect();
        for wait in waits {
            let _ = wait.await;
        }
    }

    fn send(&self, name: &str, cmd: AppCommand) -> Result<()> {
        let apps = self.apps.lock();
        let handle = apps.get(name).ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        handle.cmd_tx.send(cmd).map_err(|_| SupervisorError::NotFound(name.to_string()))
    }

    async fn call(
        &self,
        name: &str,
        make_cmd: impl FnOnce(oneshot::Sender<Result<()>>) -> AppCommand,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(name, make_cmd(tx))?;
        rx.await.map_err(|_| SupervisorError::NotFound(name.to_string()))?
    }
}

/// A worker occupying a slot, plus the channel needed to push IPC messages
/// down to its process (e.g. a future `collect-metrics` nudge).
struct RunningWorker {
    info: WorkerInfo,
    #[allow(dead_code)]
    ipc_tx: mpsc::UnboundedSender<sv_wire::MasterMessage>,
    backoff: BackoffState,
}

enum WorkerEvent {
    Ready(WorkerId),
    Heartbeat(WorkerId),
    Metrics(WorkerId, sv_wire::MemoryUsage, sv_wire::CpuUsage),
    Exited(WorkerId, ExitInfo),
}

/// Internal events funneled into the app actor's single select loop.
enum ActorEvent {
    Worker(WorkerEvent),
    RestartDue(WorkerId),
    ReadyTimeout(WorkerId),
}

struct AppActor {
    name: String,
    config: AppConfig,
    strategy: Strategy,
    proxy: Option<ProxyHandle>,
    ipc_dir: PathBuf,
    slots: BTreeMap<SlotIndex, WorkerId>,
    workers: HashMap<WorkerId, RunningWorker>,
    next_id: u64,
    started_at: Option<Instant>,
    metrics: MetricsAggregator,
    heartbeats: HeartbeatTracker,
    probes: ProbeTracker,
    reload_guard: ReloadGuard,
    event_tx: mpsc::UnboundedSender<ActorEvent>,
    log_tx: broadcast::Sender<LogLine>,
    metrics_tx: broadcast::Sender<MetricsUpdate>,
}

/// Backlog depth for the `logs`/`metrics` stream subscriptions. A slow
/// consumer simply misses the oldest entries (`RecvError::Lagged`) rather
/// than stalling the actor.
const STREAM_BACKLOG: usize = 256;

impl AppActor {
    fn new(config: AppConfig, strategy: Strategy, proxy: Option<ProxyHandle>, ipc_dir: PathBuf) -> Self {
        // Replaced with the real channel at the top of `run`; a fresh actor
        // is never polled before `run` installs it.
        let (event_tx, _unused) = mpsc::unbounded_channel();
        let (log_tx, _unused_log) = broadcast::channel(STREAM_BACKLOG);
        let (metrics_tx, _unused_metrics) = broadcast::channel(STREAM_BACKLOG);
        Self {
            name: config.name.clone(),
            config,
            strategy,
            proxy,
            ipc_dir,
            slots: BTreeMap::new(),
            workers: HashMap::new(),
            next_id: 0,
            started_at: None,
            metrics: MetricsAggregator::new(),
            heartbeats: HeartbeatTracker::new(),
            probes: ProbeTracker::new(),
            reload_guard: ReloadGuard::default(),
            event_tx,
            log_tx,
            metrics_tx,
        }
    }

    fn instance_count(&self) -> u32 {
        let cpu_count = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
        self.config.instances.resolve(cpu_count)
    }

    async fn run(&mut self, mut cmd_rx: mpsc::UnboundedReceiver<AppCommand>, instances: u32) {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        self.event_tx = event_tx;

        for i in 0..instances {
            self.spawn_into_slot(SlotIndex(i as usize)).await;
        }
        self.started_at = Some(Instant::now());

        let mut health_ticker = tokio::time::interval(env::health_tick_interval());
        health_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(AppCommand::Shutdown(reply)) => {
                            self.do_stop().await;
                            let _ = reply.send(());
                            return;
                        }
                        Some(AppCommand::Delete(reply)) => {
                            self.do_stop().await;
                            let _ = reply.send(Ok(()));
                            return;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        None => return,
                    }
                }
                event = event_rx.recv() => {
                    match event {
                        Some(ActorEvent::Worker(w)) => self.handle_worker_event(w).await,
                        Some(ActorEvent::RestartDue(id)) => self.handle_restart_due(id).await,
                        Some(ActorEvent::ReadyTimeout(id)) => self.check_ready_timeout(id).await,
                        None => {}
                    }
                }
                _ = health_ticker.tick() => self.run_health_checks().await,
            }
        }
    }

    async fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::Stop(reply) => {
                self.do_stop().await;
                let _ = reply.send(Ok(()));
            }
            AppCommand::Restart(reply) => {
                self.do_stop().await;
                for i in 0..self.instance_count() {
                    self.spawn_into_slot(SlotIndex(i as usize)).await;
                }
                let _ = reply.send(Ok(()));
            }
            AppCommand::Reload(reply) => {
                let result = self.do_reload().await;
                let _ = reply.send(result);
            }
            AppCommand::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
            AppCommand::SubscribeLogs(reply) => {
                let _ = reply.send(self.log_tx.subscribe());
            }
            AppCommand::SubscribeMetrics(reply) => {
                let _ = reply.send(self.metrics_tx.subscribe());
            }
            AppCommand::Shutdown(_) => unreachable!("handled in run()"),
            AppCommand::Delete(_) => unreachable!("handled in run()"),
        }
    }

    fn snapshot(&self) -> AppStatus {
        let mut workers: Vec<WorkerInfo> = self.workers.values().map(|w| w.info.clone()).collect();
        workers.sort_by_key(|w| w.slot.0);
        let overall = derive_overall_status(&workers);
        AppStatus { name: self.name.clone(), overall, workers, config: self.config.clone(), started_at: self.started_at }
    }

    async fn spawn_into_slot(&mut self, slot: SlotIndex) {
        let worker_id = WorkerId(self.next_id);
        self.next_id += 1;

        let strategy_env = cluster::worker_env(self.strategy, worker_id, self.config.port, self.config.clustering_enabled());
        let mut worker_env = strategy_env.clone();
        worker_env.insert("WORKER_ID".to_string(), worker_id.0.to_string());
        worker_env.insert("APP_NAME".to_string(), self.config.name.clone());
        worker_env.insert("INSTANCES".to_string(), self.instance_count().to_string());

        let mut info = WorkerInfo::new(worker_id, slot);

        match process::spawn(&self.config, worker_id, &worker_env, &self.ipc_dir).await {
            Ok(spawned) => {
                info.pid = Some(spawned.pid);
                info.started_at = Some(Instant::now());
                let _ = transition(&mut info, WorkerState::Starting, Instant::now());

                if let Some(proxy) = &self.proxy {
                    let port = strategy_env.get("PORT").and_then(|p| p.parse().ok()).unwrap_or(0);
                    proxy.add_worker(worker_id, port);
                    proxy.set_alive(worker_id, false);
                }

                let ipc_tx = self.spawn_bridge_tasks(worker_id, spawned);
                let backoff = BackoffState::new(&self.config.backoff);
                self.workers.insert(worker_id, RunningWorker { info, ipc_tx, backoff });
            }
            Err(e) => {
                warn!(app = %self.name, error = %e, "failed to spawn worker");
                let _ = transition(&mut info, WorkerState::Errored, Instant::now());
                let (ipc_tx, _unused) = mpsc::unbounded_channel();
                self.workers.insert(worker_id, RunningWorker { info, ipc_tx, backoff: BackoffState::new(&self.config.backoff) });
            }
        }
        self.slots.insert(slot, worker_id);
        self.prune_orphaned_workers();
        self.schedule_ready_timeout(worker_id);
    }

    /// Drop bookkeeping for worker ids no longer occupying any slot, once
    /// they've reached a terminal state. A crashed or replaced worker's id
    /// is superseded in `slots` by its successor but its `WorkerInfo` would
    /// otherwise linger in `workers` forever.
    fn prune_orphaned_workers(&mut self) {
        let live: HashSet<WorkerId> = self.slots.values().copied().collect();
        self.workers.retain(|id, w| {
            live.contains(id) || !matches!(w.info.state, WorkerState::Stopped | WorkerState::Crashed | WorkerState::Errored)
        });
    }

    fn schedule_ready_timeout(&self, worker_id: WorkerId) {
        let timeout = Duration::from_millis(self.config.ready_timeout_ms);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(ActorEvent::ReadyTimeout(worker_id));
        });
    }

    /// Wire a spawned worker's stdio/IPC/exit channels into this actor's
    /// event loop and return the sender used to push messages down to it.
    fn spawn_bridge_tasks(
        &self,
        worker_id: WorkerId,
        spawned: process::SpawnedWorker,
    ) -> mpsc::UnboundedSender<sv_wire::MasterMessage> {
        let tx = self.event_tx.clone();
        let mut ipc_rx = spawned.ipc_rx;
        tokio::spawn(async move {
            while let Some(msg) = ipc_rx.recv().await {
                let event = match msg {
                    sv_wire::WorkerMessage::Ready => WorkerEvent::Ready(worker_id),
                    sv_wire::WorkerMessage::Heartbeat { .. } => WorkerEvent::Heartbeat(worker_id),
                    sv_wire::WorkerMessage::Metrics { memory, cpu } => WorkerEvent::Metrics(worker_id, memory, cpu),
                    sv_wire::WorkerMessage::Custom { .. } => continue,
                };
                if tx.send(ActorEvent::Worker(event)).is_err() {
                    break;
                }
            }
        });

        let tx = self.event_tx.clone();
        let exit_rx = spawned.exit_rx;
        tokio::spawn(async move {
            if let Ok(info) = exit_rx.await {
                let _ = tx.send(ActorEvent::Worker(WorkerEvent::Exited(worker_id, info)));
            }
        });

        let mut stdio_rx = spawned.stdio_rx;
        let app = self.name.clone();
        let log_tx = self.log_tx.clone();
        tokio::spawn(async move {
            while let Some(line) = stdio_rx.recv().await {
                match line.stream {
                    process::StdioStream::Stdout => info!(app = %app, worker = %worker_id, "{}", line.line),
                    process::StdioStream::Stderr => warn!(app = %app, worker = %worker_id, "{}", line.line),
                }
                let _ = log_tx.send(LogLine { worker: worker_id, stream: line.stream, line: line.line });
            }
        });

        spawned.ipc_tx
    }

    async fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Ready(id) => {
                if let Some(w) = self.workers.get_mut(&id) {
                    if w.info.state == WorkerState::Starting {
                        let _ = transition(&mut w.info, WorkerState::Online, Instant::now());
                        if let Some(proxy) = &self.proxy {
                            proxy.set_alive(id, true);
                        }
                        info!(app = %self.name, worker = %id, "worker ready");
                    }
                }
            }
            WorkerEvent::Heartbeat(id) => {
                self.heartbeats.record(id, Instant::now());
                if let Some(w) = self.workers.get_mut(&id) {
                    w.info.last_heartbeat = Some(Instant::now());
                }
            }
            WorkerEvent::Metrics(id, memory, cpu) => {
                let sample = sv_core::MetricsSample {
                    rss: memory.rss,
                    heap_total: memory.heap_total,
                    heap_used: memory.heap_used,
                    external: memory.external,
                    cpu_user_us: cpu.user,
                    cpu_system_us: cpu.system,
                };
                let now = Instant::now();
                let derived = self.metrics.record(id, sample, now);
                if let Some(w) = self.workers.get_mut(&id) {
                    w.info.last_metrics = Some(sample);
                    w.info.last_metrics_at = Some(now);
                }
                let _ = self.metrics_tx.send(MetricsUpdate { worker: id, memory: derived.memory, cpu_pct: derived.cpu_pct });
            }
            WorkerEvent::Exited(id, exit) => self.handle_exit(id, exit).await,
        }
    }

    async fn handle_exit(&mut self, id: WorkerId, exit: ExitInfo) {
        let was_expected = matches!(
            self.workers.get(&id).map(|w| w.info.state),
            Some(WorkerState::Stopping) | Some(WorkerState::Draining)
        );

        let Some(w) = self.workers.get_mut(&id) else { return };
        w.info.last_exit_code = exit.code;
        w.info.last_signal = exit.signal;
        let uptime = w.info.uptime(Instant::now());

        if let Some(proxy) = &self.proxy {
            proxy.set_alive(id, false);
        }
        self.heartbeats.forget(id);
        self.probes.forget(id);
        self.metrics.forget(id);

        if was_expected {
            let _ = transition(&mut w.info, WorkerState::Stopped, Instant::now());
            return;
        }

        let _ = transition(&mut w.info, WorkerState::Crashed, Instant::now());
        w.info.restart_count += 1;
        w.info.last_crash_at = Some(Instant::now());

        if !self.config.autorestart {
            let _ = transition(&mut w.info, WorkerState::Stopped, Instant::now());
            return;
        }

        let restart = self.config.restart.clone();
        let backoff_policy = self.config.backoff.clone();
        let outcome = {
            let w = self.workers.get_mut(&id).expect("worker present");
            on_exit(&mut w.backoff, &mut w.info.consecutive_crashes, &restart, &backoff_policy, uptime, Instant::now())
        };

        match outcome {
            ExitOutcome::Restart { delay } => {
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(ActorEvent::RestartDue(id));
                });
            }
            ExitOutcome::BudgetExhausted => {
                if let Some(w) = self.workers.get_mut(&id) {
                    let _ = transition(&mut w.info, WorkerState::Errored, Instant::now());
                }
                warn!(app = %self.name, worker = %id, "restart budget exhausted");
            }
        }
    }

    async fn handle_restart_due(&mut self, id: WorkerId) {
        let Some(w) = self.workers.get(&id) else { return };
        if w.info.state != WorkerState::Crashed {
            return;
        }
        let slot = w.info.slot;
        self.spawn_into_slot(slot).await;
    }

    async fn check_ready_timeout(&mut self, id: WorkerId) {
        let Some(w) = self.workers.get(&id) else { return };
        if w.info.state == WorkerState::Starting {
            warn!(app = %self.name, worker = %id, "ready timeout");
            // Kill the worker but leave its FSM state alone: the process exit
            // this triggers flows through the ordinary `handle_exit` crash
            // path, so a ready-timeout counts toward the restart budget the
            // same as any other crash (spec's resolved open question).
            let signal = self.config.shutdown.signal;
            let kill_timeout = Duration::from_millis(self.config.shutdown.kill_timeout_ms);
            if let Some(pid) = w.info.pid {
                tokio::spawn(async move {
                    let _: KillOutcome = process::kill(pid, signal, kill_timeout).await;
                });
            }
        }
    }

    async fn run_health_checks(&mut self) {
        let now = Instant::now();
        let mut unhealthy: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, w)| w.info.state == WorkerState::Online)
            .filter(|(id, _)| self.heartbeats.is_unhealthy(**id, now))
            .map(|(id, _)| *id)
            .collect();

        if let Some(health_check) = self.config.health_check.clone().filter(|h| h.enabled) {
            let online_ids: Vec<WorkerId> =
                self.workers.iter().filter(|(_, w)| w.info.state == WorkerState::Online).map(|(id, _)| *id).collect();
            let online: Vec<(WorkerId, u16)> =
                online_ids.into_iter().filter_map(|id| self.worker_probe_port(id).map(|port| (id, port))).collect();
            for (id, port) in online {
                if self.probes.probe(id, port, &health_check).await && !unhealthy.contains(&id) {
                    unhealthy.push(id);
                }
            }
        }

        for id in unhealthy {
            warn!(app = %self.name, worker = %id, "unhealthy, restarting");
            self.restart_worker(id).await;
        }
    }

    fn worker_probe_port(&self, worker_id: WorkerId) -> Option<u16> {
        let env = cluster::worker_env(self.strategy, worker_id, self.config.port, self.config.clustering_enabled());
        env.get("PORT").and_then(|p| p.parse().ok())
    }

    async fn restart_worker(&mut self, id: WorkerId) {
        let Some(w) = self.workers.get_mut(&id) else { return };
        let pid = w.info.pid;
        let signal = self.config.shutdown.signal;
        let kill_timeout = Duration::from_millis(self.config.shutdown.kill_timeout_ms);
        let _ = transition(&mut w.info, WorkerState::Stopping, Instant::now());
        if let Some(pid) = pid {
            process::kill(pid, signal, kill_timeout).await;
        }
    }

    async fn do_stop(&mut self) {
        let signal = self.config.shutdown.signal;
        let kill_timeout = Duration::from_millis(self.config.shutdown.kill_timeout_ms);

        let mut pids = Vec::new();
        for w in self.workers.values_mut() {
            if matches!(w.info.state, WorkerState::Online | WorkerState::Starting | WorkerState::Spawning) {
                let _ = transition(&mut w.info, WorkerState::Stopping, Instant::now());
            }
            if let Some(pid) = w.info.pid {
                pids.push(pid);
            }
        }
        for pid in pids {
            process::kill(pid, signal, kill_timeout).await;
        }
        for w in self.workers.values_mut() {
            if w.info.state == WorkerState::Stopping {
                let _ = transition(&mut w.info, WorkerState::Stopped, Instant::now());
            }
        }
        if let Some(proxy) = &self.proxy {
            proxy.stop().await;
        }
    }

    /// Batched rolling restart with rollback on batch failure (spec §4.10).
    /// A single-instance app has no second worker to take over while the
    /// first is replaced, so true zero-downtime reload is impossible;
    /// fall back to the same stop-then-respawn `AppCommand::Restart` does.
    async fn do_reload(&mut self) -> Result<()> {
        if !self.reload_guard.begin() {
            return Err(SupervisorError::ReloadFailed(self.name.clone(), "reload already in progress".into()));
        }

        if self.instance_count() == 1 {
            self.do_stop().await;
            for i in 0..self.instance_count() {
                self.spawn_into_slot(SlotIndex(i as usize)).await;
            }
            self.reload_guard.finish();
            return Ok(());
        }

        let batch_size = self.config.clustering.as_ref().map(|c| c.rolling_restart.batch_size).unwrap_or(1);
        let batch_delay =
            Duration::from_millis(self.config.clustering.as_ref().map(|c| c.rolling_restart.batch_delay_ms).unwrap_or(0));

        let slots: Vec<SlotIndex> = self.slots.keys().copied().collect();
        let batches = plan_batches(&slots, batch_size);
        let signal = self.config.shutdown.signal;
        let kill_timeout = Duration::from_millis(self.config.shutdown.kill_timeout_ms);
        let ready_timeout = Duration::from_millis(self.config.ready_timeout_ms);

        for (batch_idx, batch) in batches.iter().enumerate() {
            for &slot in batch {
                let Some(&id) = self.slots.get(&slot) else { continue };
                if let Some(proxy) = &self.proxy {
                    proxy.set_alive(id, false);
                }
                let pid = self.workers.get(&id).and_then(|w| w.info.pid);
                if let Some(w) = self.workers.get_mut(&id) {
                    let _ = transition(&mut w.info, WorkerState::Draining, Instant::now());
                    let _ = transition(&mut w.info, WorkerState::Stopping, Instant::now());
                }
                if let Some(pid) = pid {
                    process::kill(pid, signal, kill_timeout).await;
                }
                if let Some(w) = self.workers.get_mut(&id) {
                    let _ = transition(&mut w.info, WorkerState::Stopped, Instant::now());
                }
            }

            for &slot in batch {
                self.spawn_into_slot(slot).await;
            }

            let deadline = Instant::now() + ready_timeout;
            loop {
                let all_online = batch.iter().all(|slot| {
                    self.slots.get(slot).and_then(|id| self.workers.get(id)).is_some_and(|w| w.info.state == WorkerState::Online)
                });
                if all_online {
                    break;
                }
                let any_errored = batch.iter().any(|slot| {
                    self.slots.get(slot).and_then(|id| self.workers.get(id)).is_some_and(|w| w.info.state == WorkerState::Errored)
                });
                if any_errored || Instant::now() >= deadline {
                    self.rollback_remaining(&batches[batch_idx + 1..]);
                    self.reload_guard.finish();
                    return Err(SupervisorError::ReloadFailed(self.name.clone(), "replacement failed to become ready".into()));
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            for &slot in batch {
                if let Some(&id) = self.slots.get(&slot) {
                    if let Some(proxy) = &self.proxy {
                        proxy.set_alive(id, true);
                    }
                }
            }
            tokio::time::sleep(batch_delay).await;
        }

        self.reload_guard.finish();
        Ok(())
    }

    /// Re-mark still-old, not-yet-replaced batches alive (spec §4.10 step 5).
    fn rollback_remaining(&self, remaining: &[Vec<SlotIndex>]) {
        let Some(proxy) = &self.proxy else { return };
        for batch in remaining {
            for slot in batch {
                if let Some(&id) = self.slots.get(slot) {
                    proxy.set_alive(id, true);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
