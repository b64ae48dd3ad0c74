// SPDX-License-Identifier: MIT

//! Process manager (C5): spawn/kill workers, env hygiene, stdio capture,
//! and the per-worker IPC channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sv_core::{AppConfig, ShutdownSignal, WorkerId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::env::MASTER_ENV_PREFIX;

/// A worker's exit, as reported by the reaper task that owns its `Child`.
#[derive(Debug, Clone, Copy)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Outcome of an attempted `spawn`.
pub struct SpawnedWorker {
    pub pid: u32,
    /// Lines captured from the child's stdout/stderr, tagged by stream.
    pub stdio_rx: mpsc::UnboundedReceiver<StdioLine>,
    /// Worker-originated IPC messages, already frame-decoded.
    pub ipc_rx: mpsc::UnboundedReceiver<sv_wire::WorkerMessage>,
    /// Handle for sending master-originated IPC messages to this worker.
    pub ipc_tx: mpsc::UnboundedSender<sv_wire::MasterMessage>,
    /// Resolves once the reaper task observes the child exit.
    pub exit_rx: tokio::sync::oneshot::Receiver<ExitInfo>,
}

pub struct StdioLine {
    pub stream: StdioStream,
    pub line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioStream {
    Stdout,
    Stderr,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),
    #[error("failed to bind worker ipc socket: {0}")]
    IpcBind(std::io::Error),
}

/// Strip master-only keys and overlay the strategy/app-provided worker env.
///
/// Starts from the master's own environment (so inherited `PATH`, locale,
/// etc. survive) then deletes every key namespaced under
/// [`MASTER_ENV_PREFIX`] before layering on the computed worker variables.
pub fn build_worker_env(
    worker_env: &HashMap<String, String>,
    user_overlay: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut env: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| !k.starts_with(MASTER_ENV_PREFIX))
        .collect();
    for (k, v) in worker_env {
        env.insert(k.clone(), v.clone());
    }
    for (k, v) in user_overlay {
        env.insert(k.clone(), v.clone());
    }
    env.into_iter().collect()
}

/// Spawn a single worker process.
///
/// `worker_env` is the strategy-computed overlay (`WORKER_ID`, `APP_NAME`,
/// `INSTANCES`, `PORT`, `REUSE_PORT`, plus any strategy-specific keys); it is
/// applied after env stripping and before `cfg.env` so user overlay always
/// wins (spec §4.5).
pub async fn spawn(
    cfg: &AppConfig,
    worker_id: WorkerId,
    worker_env: &HashMap<String, String>,
    ipc_dir: &PathBuf,
) -> Result<SpawnedWorker, ProcessError> {
    let mut command = match &cfg.interpreter {
        Some(interpreter) => {
            let mut c = Command::new(interpreter);
            c.arg(&cfg.script);
            c
        }
        None => Command::new(&cfg.script),
    };

    let socket_path = ipc_dir.join(format!("{}.sock", worker_id));
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path).map_err(ProcessError::IpcBind)?;

    let env = build_worker_env(worker_env, &cfg.env);
    command.env_clear();
    for (k, v) in &env {
        command.env(k, v);
    }
    command.env("SUPERVISOR_IPC_SOCKET_PATH", &socket_path);
    if let Some(cwd) = &cfg.cwd {
        command.current_dir(cwd);
    }
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = command.spawn().map_err(ProcessError::Spawn)?;
    let pid = child.id().unwrap_or_default();

    let (stdio_tx, stdio_rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, StdioStream::Stdout, stdio_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, StdioStream::Stderr, stdio_tx);
    }

    let (ipc_rx_tx, ipc_rx) = mpsc::unbounded_channel();
    let (ipc_tx, ipc_tx_rx) = mpsc::unbounded_channel::<sv_wire::MasterMessage>();
    tokio::spawn(async move {
        let stream = match tokio::time::timeout(Duration::from_secs(10), listener.accept()).await
        {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                warn!(pid, error = %e, "worker ipc accept failed");
                return;
            }
            Err(_) => {
                debug!(pid, "worker never connected to its ipc socket");
                return;
            }
        };
        run_ipc_bridge(stream, ipc_rx_tx, ipc_tx_rx).await;
    });

    let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let status = child.wait().await;
        let info = match status {
            Ok(status) => ExitInfo {
                code: status.code(),
                signal: std::os::unix::process::ExitStatusExt::signal(&status),
            },
            Err(e) => {
                warn!(pid, error = %e, "failed to wait on worker process");
                ExitInfo { code: None, signal: None }
            }
        };
        let _ = exit_tx.send(info);
    });

    info!(pid, worker = %worker_id, "worker process spawned");

    Ok(SpawnedWorker { pid, stdio_rx, ipc_rx, ipc_tx, exit_rx })
}

async fn run_ipc_bridge(
    stream: UnixStream,
    inbound: mpsc::UnboundedSender<sv_wire::WorkerMessage>,
    mut outbound: mpsc::UnboundedReceiver<sv_wire::MasterMessage>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let read_task = async move {
        loop {
            match sv_wire::read_frame::<_, sv_wire::WorkerMessage>(&mut reader).await {
                Ok(msg) => {
                    if inbound.send(msg).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    };
    let write_task = async move {
        while let Some(msg) = outbound.recv().await {
            if sv_wire::write_frame(&mut writer, &msg).await.is_err() {
                break;
            }
        }
    };
    tokio::join!(read_task, write_task);
}

fn spawn_line_reader<R>(reader: R, stream: StdioStream, tx: mpsc::UnboundedSender<StdioLine>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(StdioLine { stream, line }).is_err() {
                break;
            }
        }
    });
}

/// Outcome of [`kill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The process exited before escalation was needed.
    Exited,
    /// The process had to be escalated to `SIGKILL`.
    Killed,
}

/// True while `pid` still answers to a signal-0 probe.
fn is_alive(pid: Pid) -> bool {
    signal::kill(pid, None).is_ok()
}

/// Send `signal`, poll liveness, escalate to `SIGKILL` on `kill_timeout`.
///
/// Liveness is polled with a signal-0 probe rather than `Child::try_wait`
/// so the caller doesn't need to retain ownership of the `Child` — the
/// reaper task spawned in [`spawn`] owns it and reports the exit
/// independently via [`SpawnedWorker::exit_rx`]. A missing process (already
/// reaped) is treated as a successful `Exited`, never as an error (spec §4.5).
pub async fn kill(pid: u32, signal: ShutdownSignal, kill_timeout: Duration) -> KillOutcome {
    let pid = Pid::from_raw(pid as i32);
    let nix_signal = match signal {
        ShutdownSignal::Sigterm => Signal::SIGTERM,
        ShutdownSignal::Sigint => Signal::SIGINT,
    };
    if signal::kill(pid, nix_signal).is_err() {
        return KillOutcome::Exited;
    }

    let poll_interval = Duration::from_millis(50);
    let deadline = tokio::time::Instant::now() + kill_timeout;
    loop {
        if !is_alive(pid) {
            return KillOutcome::Exited;
        }
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    let _ = signal::kill(pid, Signal::SIGKILL);
    KillOutcome::Killed
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
