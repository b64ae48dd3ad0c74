// SPDX-License-Identifier: MIT

//! Command handlers (C13): the fixed dispatch table from control commands to
//! orchestrator operations.

use serde_json::json;
use sv_core::AppConfig;
use sv_wire::{ControlRequest, ControlResponse, StreamChunk};
use tokio::io::AsyncWrite;

use crate::orchestrator::Orchestrator;

fn arg_name(req: &ControlRequest) -> Result<String, String> {
    req.args.get("name").and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| "missing `name` argument".to_string())
}

/// Handle every command except `logs`/`metrics`, which stream instead of
/// replying once (see [`handle_stream`]).
pub async fn handle_request(orchestrator: &Orchestrator, req: &ControlRequest) -> ControlResponse {
    let result = dispatch(orchestrator, req).await;
    match result {
        Ok(data) => ControlResponse::ok(req.id.clone(), data),
        Err(message) => ControlResponse::err(req.id.clone(), message),
    }
}

async fn dispatch(orchestrator: &Orchestrator, req: &ControlRequest) -> Result<serde_json::Value, String> {
    match req.cmd.as_str() {
        "start" => {
            let config_value = req.args.get("config").cloned().ok_or_else(|| "missing `args.config`".to_string())?;
            let config: AppConfig = serde_json::from_value(config_value).map_err(|e| format!("invalid config: {e}"))?;
            orchestrator.start_app(config).await.map_err(|e| e.to_string())?;
            Ok(json!({}))
        }
        "stop" => {
            orchestrator.stop_app(&arg_name(req)?).await.map_err(|e| e.to_string())?;
            Ok(json!({}))
        }
        "restart" => {
            orchestrator.restart_app(&arg_name(req)?).await.map_err(|e| e.to_string())?;
            Ok(json!({}))
        }
        "reload" => {
            orchestrator.reload_app(&arg_name(req)?).await.map_err(|e| e.to_string())?;
            Ok(json!({}))
        }
        "delete" => {
            orchestrator.delete_app(&arg_name(req)?).await.map_err(|e| e.to_string())?;
            Ok(json!({}))
        }
        "list" => {
            let apps = orchestrator.list_apps().await;
            Ok(json!(apps.iter().map(status_to_json).collect::<Vec<_>>()))
        }
        "status" => {
            let status = orchestrator.get_app_status(&arg_name(req)?).await.map_err(|e| e.to_string())?;
            Ok(status_to_json(&status))
        }
        "dump" => {
            let apps = orchestrator.list_apps().await;
            Ok(json!({"apps": apps.iter().map(status_to_json).collect::<Vec<_>>()}))
        }
        "ping" => Ok(json!({"pong": true})),
        "shutdown" => {
            orchestrator.shutdown().await;
            Ok(json!({}))
        }
        "logs" | "metrics" => Err(format!("`{}` is a streaming command; use handle_stream", req.cmd)),
        other => Err(format!("unknown command `{other}`")),
    }
}

/// Handle `logs`/`metrics`: relay the app's broadcast stream onto `writer`
/// as [`StreamChunk`] frames until the subscription ends or the connection
/// closes. Unlike request/response commands this never sends a final `done`
/// chunk on its own — the tail only stops when the caller disconnects.
pub async fn handle_stream<W: AsyncWrite + Unpin>(orchestrator: &Orchestrator, req: &ControlRequest, writer: &mut W) {
    let name = match arg_name(req) {
        Ok(name) => name,
        Err(message) => {
            let _ = sv_wire::write_frame(writer, &StreamChunk::last(req.id.clone(), json!({"error": message}))).await;
            return;
        }
    };

    match req.cmd.as_str() {
        "logs" => {
            let mut rx = match orchestrator.subscribe_logs(&name).await {
                Ok(rx) => rx,
                Err(e) => {
                    let _ = sv_wire::write_frame(writer, &StreamChunk::last(req.id.clone(), json!({"error": e.to_string()}))).await;
                    return;
                }
            };
            loop {
                match rx.recv().await {
                    Ok(line) => {
                        let stream = match line.stream {
                            crate::process::StdioStream::Stdout => "stdout",
                            crate::process::StdioStream::Stderr => "stderr",
                        };
                        let chunk = StreamChunk::chunk(req.id.clone(), json!({"worker": line.worker.0, "stream": stream, "line": line.line}));
                        if sv_wire::write_frame(writer, &chunk).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
        "metrics" => {
            let mut rx = match orchestrator.subscribe_metrics(&name).await {
                Ok(rx) => rx,
                Err(e) => {
                    let _ = sv_wire::write_frame(writer, &StreamChunk::last(req.id.clone(), json!({"error": e.to_string()}))).await;
                    return;
                }
            };
            loop {
                match rx.recv().await {
                    Ok(sample) => {
                        let chunk = StreamChunk::chunk(
                            req.id.clone(),
                            json!({
                                "worker": sample.worker.0,
                                "memory": {
                                    "rss": sample.memory.rss,
                                    "heapTotal": sample.memory.heap_total,
                                    "heapUsed": sample.memory.heap_used,
                                    "external": sample.memory.external,
                                },
                                "cpuPct": sample.cpu_pct,
                            }),
                        );
                        if sv_wire::write_frame(writer, &chunk).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
        _ => {
            let _ = sv_wire::write_frame(writer, &StreamChunk::last(req.id.clone(), json!({"error": "not a streaming command"}))).await;
        }
    }
}

fn status_to_json(status: &sv_core::AppStatus) -> serde_json::Value {
    let overall = match status.overall {
        sv_core::OverallStatus::Running => "running",
        sv_core::OverallStatus::Stopped => "stopped",
        sv_core::OverallStatus::Errored => "errored",
        sv_core::OverallStatus::Starting => "starting",
    };
    json!({
        "name": status.name,
        "overall": overall,
        "workers": status.workers.iter().map(worker_to_json).collect::<Vec<_>>(),
    })
}

fn worker_to_json(worker: &sv_core::WorkerInfo) -> serde_json::Value {
    json!({
        "id": worker.id.0,
        "slot": worker.slot.0,
        "pid": worker.pid,
        "state": format!("{:?}", worker.state).to_lowercase(),
        "restartCount": worker.restart_count,
        "lastExitCode": worker.last_exit_code,
        "lastSignal": worker.last_signal,
    })
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
