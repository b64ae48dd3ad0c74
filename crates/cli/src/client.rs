// SPDX-License-Identifier: MIT

//! Control-socket client: a thin `ControlRequest`/`ControlResponse` pair over
//! the same Unix socket `supervisord` listens on.

use std::path::PathBuf;

use serde_json::Value;
use sv_wire::{ControlRequest, ControlResponse, ProtocolError, StreamChunk};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("supervisord is not running (no socket at {path}): {source}")]
    Connect { path: PathBuf, #[source] source: std::io::Error },
    #[error("lost connection to supervisord: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("{0}")]
    Remote(String),
}

/// Resolve the control socket path the same way `supervisord` does
/// (`SUPERVISOR_IPC_SOCKET` > `XDG_RUNTIME_DIR/supervisor.sock` > state dir).
/// Duplicated rather than shared because `sv-daemon` is a binary crate with
/// no library surface for this CLI to depend on.
pub fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("SUPERVISOR_IPC_SOCKET") {
        return PathBuf::from(path);
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("supervisor.sock");
    }
    state_dir().join("supervisor.sock")
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SUPERVISOR_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("supervisor");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".local/state/supervisor")
}

pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub async fn connect() -> Result<Self, ClientError> {
        let path = socket_path();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| ClientError::Connect { path, source })?;
        Ok(Self { stream })
    }

    /// Send a request and read back exactly one response frame.
    pub async fn call(&mut self, cmd: &str, args: Value) -> Result<Value, ClientError> {
        let req = ControlRequest::new(cmd, args);
        sv_wire::write_frame(&mut self.stream, &req).await?;
        let resp: ControlResponse = sv_wire::read_frame(&mut self.stream).await?;
        if resp.ok {
            Ok(resp.data.unwrap_or(Value::Null))
        } else {
            Err(ClientError::Remote(resp.error.unwrap_or_else(|| "unknown error".to_string())))
        }
    }

    /// Send a streaming request (`logs`/`metrics`) and invoke `on_chunk` for
    /// every frame until the connection closes or `on_chunk` asks to stop.
    pub async fn stream(
        &mut self,
        cmd: &str,
        args: Value,
        mut on_chunk: impl FnMut(Value) -> bool,
    ) -> Result<(), ClientError> {
        let req = ControlRequest::new(cmd, args);
        sv_wire::write_frame(&mut self.stream, &req).await?;
        loop {
            let chunk: StreamChunk = match sv_wire::read_frame(&mut self.stream).await {
                Ok(chunk) => chunk,
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if !on_chunk(chunk.data) || chunk.done {
                return Ok(());
            }
        }
    }
}
