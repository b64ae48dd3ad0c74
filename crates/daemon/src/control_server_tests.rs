// SPDX-License-Identifier: MIT

use super::*;
use sv_wire::{ControlRequest, ControlResponse};

#[tokio::test]
async fn ping_round_trips_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");
    let ipc_dir = dir.path().join("ipc");
    std::fs::create_dir_all(&ipc_dir).unwrap();

    let orchestrator = Arc::new(Orchestrator::new(ipc_dir));
    let server = ControlServer::bind(&socket_path).unwrap();
    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(server.run(orchestrator, server_shutdown));

    let mut client = UnixStream::connect(&socket_path).await.unwrap();
    let request = ControlRequest::new("ping", serde_json::json!({}));
    sv_wire::write_frame(&mut client, &request).await.unwrap();
    let response: ControlResponse = sv_wire::read_frame(&mut client).await.unwrap();

    assert!(response.ok);
    assert_eq!(response.id, request.id);

    shutdown.cancel();
    let _ = handle.await;
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn unknown_command_returns_an_error_response() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");
    let orchestrator = Arc::new(Orchestrator::new(dir.path().join("ipc")));
    let server = ControlServer::bind(&socket_path).unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.run(orchestrator, shutdown.clone()));

    let mut client = UnixStream::connect(&socket_path).await.unwrap();
    let request = ControlRequest::new("not-a-real-command", serde_json::json!({}));
    sv_wire::write_frame(&mut client, &request).await.unwrap();
    let response: ControlResponse = sv_wire::read_frame(&mut client).await.unwrap();

    assert!(!response.ok);
    assert!(response.error.is_some());

    shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn missing_id_or_cmd_gets_an_empty_id_error_response() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");
    let orchestrator = Arc::new(Orchestrator::new(dir.path().join("ipc")));
    let server = ControlServer::bind(&socket_path).unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.run(orchestrator, shutdown.clone()));

    let mut client = UnixStream::connect(&socket_path).await.unwrap();
    sv_wire::write_frame(&mut client, &serde_json::json!({"cmd": "ping"})).await.unwrap();
    let response: ControlResponse = sv_wire::read_frame(&mut client).await.unwrap();

    assert!(!response.ok);
    assert_eq!(response.id, "");
    assert!(response.error.is_some());

    // The connection must still be usable afterward: a second, well-formed
    // request on the same socket gets a normal reply.
    let request = ControlRequest::new("ping", serde_json::json!({}));
    sv_wire::write_frame(&mut client, &request).await.unwrap();
    let response: ControlResponse = sv_wire::read_frame(&mut client).await.unwrap();
    assert!(response.ok);
    assert_eq!(response.id, request.id);

    shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test]
async fn binding_over_a_stale_socket_file_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("control.sock");
    std::fs::write(&socket_path, b"not a socket").unwrap();

    let server = ControlServer::bind(&socket_path).unwrap();
    drop(server);
}
