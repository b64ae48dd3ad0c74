// SPDX-License-Identifier: MIT

//! TCP proxy (C8): userland L4 round-robin splice for the `proxy` cluster strategy.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use sv_core::WorkerId;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct WorkerEntry {
    port: u16,
    alive: bool,
}

enum ProxyCommand {
    AddWorker { id: WorkerId, port: u16 },
    SetAlive { id: WorkerId, alive: bool },
    AliveCount(oneshot::Sender<usize>),
    Stop(oneshot::Sender<()>),
}

/// Handle to a running proxy actor. Cheap to clone; all mutation is funneled
/// through the actor's own mailbox (spec §5 shared-resource policy).
#[derive(Clone)]
pub struct ProxyHandle {
    cmd_tx: mpsc::UnboundedSender<ProxyCommand>,
}

impl ProxyHandle {
    pub fn add_worker(&self, id: WorkerId, port: u16) {
        let _ = self.cmd_tx.send(ProxyCommand::AddWorker { id, port });
    }

    pub fn set_alive(&self, id: WorkerId, alive: bool) {
        let _ = self.cmd_tx.send(ProxyCommand::SetAlive { id, alive });
    }

    pub async fn alive_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(ProxyCommand::AliveCount(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Close the listener, forcibly end every active client splice, and
    /// clear the worker map and round-robin cursor. Idempotent: a second
    /// call after the actor has already stopped is a harmless no-op because
    /// the channel send simply fails (spec §4.8 P5).
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(ProxyCommand::Stop(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

/// Bind the public listener and spawn the proxy actor task.
pub async fn spawn(public_port: u16) -> std::io::Result<ProxyHandle> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, public_port)).await?;
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(listener, cmd_rx));
    Ok(ProxyHandle { cmd_tx })
}

async fn run(listener: TcpListener, mut cmd_rx: mpsc::UnboundedReceiver<ProxyCommand>) {
    let mut workers: BTreeMap<WorkerId, WorkerEntry> = BTreeMap::new();
    let mut rr_index: usize = 0;
    let connections = CancellationToken::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((client, _addr)) = accepted else { continue };
                let Some((id, port)) = pick_next(&workers, &mut rr_index) else {
                    debug!("no alive worker available, dropping client connection");
                    continue;
                };
                debug!(worker = %id, port, "proxying connection");
                let token = connections.child_token();
                tokio::spawn(splice(client, port, token));
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ProxyCommand::AddWorker { id, port }) => {
                        workers.insert(id, WorkerEntry { port, alive: true });
                    }
                    Some(ProxyCommand::SetAlive { id, alive }) => {
                        if let Some(entry) = workers.get_mut(&id) {
                            entry.alive = alive;
                        }
                    }
                    Some(ProxyCommand::AliveCount(reply)) => {
                        let count = workers.values().filter(|e| e.alive).count();
                        let _ = reply.send(count);
                    }
                    Some(ProxyCommand::Stop(reply)) => {
                        connections.cancel();
                        workers.clear();
                        rr_index = 0;
                        let _ = reply.send(());
                        return;
                    }
                    None => return,
                }
            }
        }
    }
}

/// Round-robin selection over a cached, sorted id list: scan forward at most
/// `N` positions starting at `rr_index`, the first alive worker wins, and
/// `rr_index` advances to one past the winner (spec §4.8).
fn pick_next(workers: &BTreeMap<WorkerId, WorkerEntry>, rr_index: &mut usize) -> Option<(WorkerId, u16)> {
    let ids: Vec<WorkerId> = workers.keys().copied().collect();
    let n = ids.len();
    if n == 0 {
        return None;
    }
    *rr_index %= n;
    for offset in 0..n {
        let pos = (*rr_index + offset) % n;
        let id = ids[pos];
        if workers[&id].alive {
            *rr_index = (pos + 1) % n;
            return Some((id, workers[&id].port));
        }
    }
    None
}

/// Connect to the chosen worker, buffering any client bytes that arrive
/// before the upstream connection is ready, then forward bidirectionally
/// until either side closes (spec §4.8).
async fn splice(mut client: TcpStream, port: u16, token: CancellationToken) {
    let mut prebuf = Vec::new();
    let connect = TcpStream::connect((Ipv4Addr::LOCALHOST, port));
    tokio::pin!(connect);

    let mut upstream = loop {
        let mut chunk = [0u8; 4096];
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = &mut connect => {
                match result {
                    Ok(stream) => break stream,
                    Err(e) => {
                        warn!(port, error = %e, "upstream connect failed");
                        return;
                    }
                }
            }
            n = client.read(&mut chunk) => {
                match n {
                    Ok(0) | Err(_) => return,
                    Ok(n) => prebuf.extend_from_slice(&chunk[..n]),
                }
            }
        }
    };

    if !prebuf.is_empty() {
        use tokio::io::AsyncWriteExt;
        if upstream.write_all(&prebuf).await.is_err() {
            return;
        }
    }

    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::io::copy_bidirectional(&mut client, &mut upstream) => {}
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
