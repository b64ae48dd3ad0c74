// SPDX-License-Identifier: MIT

//! `supervisord`: the master process. Boots the orchestrator, the control
//! server, and the signal hub, then waits for either to ask for shutdown.

mod cluster;
mod commands;
mod control_server;
mod env;
mod health;
mod metrics;
mod orchestrator;
mod process;
mod proxy;
mod reload;
mod signals;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orchestrator::Orchestrator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    install_panic_hook();

    let ipc_dir = env::state_dir().join("ipc");
    if let Err(e) = std::fs::create_dir_all(&ipc_dir) {
        tracing::error!(error = %e, path = %ipc_dir.display(), "failed to create worker ipc directory");
        std::process::exit(1);
    }

    let orchestrator = Arc::new(Orchestrator::new(ipc_dir));
    let socket_path = env::ipc_socket_path();
    let server = match control_server::ControlServer::bind(&socket_path) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, path = %socket_path.display(), "failed to bind control socket");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    let server_task = tokio::spawn(control_server::ControlServer::run(server, Arc::clone(&orchestrator), shutdown.clone()));
    let signal_task = tokio::spawn(signals::run(Arc::clone(&orchestrator), shutdown.clone()));

    info!("supervisord ready");

    let _ = tokio::join!(server_task, signal_task);
    info!("supervisord exiting");
}

/// Log a panic in any task (most importantly an app actor) via `tracing`
/// before the default hook prints its own backtrace, so a crashed actor
/// leaves a structured record rather than only raw stderr output.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(%info, "task panicked");
        default_hook(info);
    }));
}
