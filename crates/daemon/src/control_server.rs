// SPDX-License-Identifier: MIT

//! Control server (C12): Unix-domain-socket request/response/stream dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use sv_wire::{ControlRequest, ControlResponse};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands;
use crate::orchestrator::Orchestrator;

pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    /// Bind the control socket, unlinking a stale file left behind by a
    /// previous crashed run first.
    pub fn bind(socket_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        Ok(Self { listener, socket_path: socket_path.to_path_buf() })
    }

    /// Accept connections until `shutdown` is cancelled, then unlink the
    /// socket file (spec §8 scenario 5).
    pub async fn run(self, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) {
        info!(path = %self.socket_path.display(), "control server listening");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let orchestrator = Arc::clone(&orchestrator);
                            let conn_shutdown = shutdown.child_token();
                            tokio::spawn(handle_connection(stream, orchestrator, conn_shutdown));
                        }
                        Err(e) => warn!(error = %e, "control server accept failed"),
                    }
                }
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!(path = %self.socket_path.display(), "control server stopped");
    }
}

/// One connection handles requests sequentially: a streaming command (`logs`,
/// `metrics`) occupies the connection until the client disconnects, matching
/// the one-command-per-connection pattern the CLI uses against this socket.
async fn handle_connection(stream: UnixStream, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        // Frames decode into a bare `Value` here rather than straight into
        // `ControlRequest`: a line missing `id`/`cmd` is a well-formed JSON
        // object that the codec would otherwise drop silently (C1's
        // generic "never fatal" contract), but spec §4.12 requires this
        // specific shape to produce an empty-id error response.
        let raw: Value = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = sv_wire::read_frame(&mut reader) => {
                match result {
                    Ok(raw) => raw,
                    Err(_) => break,
                }
            }
        };

        let request = match parse_request(raw) {
            Ok(req) => req,
            Err(response) => {
                if sv_wire::write_frame(&mut writer, &response).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if sv_wire::is_streaming_command(&request.cmd) {
            commands::handle_stream(&orchestrator, &request, &mut writer).await;
            continue;
        }

        let response = commands::handle_request(&orchestrator, &request).await;
        if sv_wire::write_frame(&mut writer, &response).await.is_err() {
            break;
        }
    }

    debug!("control connection closed");
}

/// Validate a raw decoded frame against the control protocol's required
/// fields (spec §4.12): missing or non-string `id`/`cmd` yields an error
/// response with an empty id, since there's no request id to echo back.
fn parse_request(raw: Value) -> Result<ControlRequest, ControlResponse> {
    let id = raw.get("id").and_then(Value::as_str).map(str::to_string);
    let cmd = raw.get("cmd").and_then(Value::as_str).map(str::to_string);
    match (id, cmd) {
        (Some(id), Some(cmd)) => {
            let args = raw.get("args").cloned().unwrap_or(Value::Null);
            Ok(ControlRequest { id, cmd, args })
        }
        _ => Err(ControlResponse::err(String::new(), "request missing `id` or `cmd`")),
    }
}

#[cfg(test)]
#[path = "control_server_tests.rs"]
mod tests;
