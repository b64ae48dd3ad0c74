// SPDX-License-Identifier: MIT

//! Minimal worker used by the end-to-end scenario tests in `tests/specs.rs`.
//!
//! Connects to the IPC socket the master created, announces `ready`, then
//! heartbeats once a second until it receives `SIGTERM`. Set
//! `FAKE_WORKER_CRASH=1` to exit immediately instead, for exercising C4's
//! crash-recovery backoff.

use std::time::Duration;

use sv_wire::WorkerMessage;
use tokio::net::UnixStream;

#[tokio::main]
async fn main() {
    if std::env::var("FAKE_WORKER_CRASH").is_ok() {
        std::process::exit(1);
    }

    let socket_path = std::env::var("SUPERVISOR_IPC_SOCKET_PATH").expect("master must set the ipc socket path");

    let mut stream = connect_with_retry(&socket_path).await;
    let _ = sv_wire::write_frame(&mut stream, &WorkerMessage::Ready).await;

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("install SIGTERM handler");
    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                std::process::exit(0);
            }
            _ = ticker.tick() => {
                let uptime = started.elapsed().as_secs_f64();
                let _ = sv_wire::write_frame(&mut stream, &WorkerMessage::Heartbeat { uptime }).await;
            }
        }
    }
}

async fn connect_with_retry(path: &str) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    UnixStream::connect(path).await.expect("ipc socket never became connectable")
}
