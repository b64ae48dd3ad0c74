// SPDX-License-Identifier: MIT

//! Signal hub (C14): OS signals -> orchestrator shutdown/reload callbacks.
//!
//! `SIGTERM`/`SIGINT` trigger a drain-and-exit; `SIGHUP` triggers a
//! rolling reload of every running app; `SIGPIPE` is ignored outright
//! (tokio's signal handling already keeps the process from dying on it).
//! A `shuttingDown` flag makes a second termination signal a no-op, per
//! spec §4.14's resolved open question: the first signal to arrive wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::Orchestrator;

/// Install the signal handlers and run until `shutdown` fires, either from
/// a caught `SIGTERM`/`SIGINT` or because the caller cancelled it directly
/// (e.g. the control server processed an explicit `shutdown` command).
pub async fn run(orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGHUP handler");
            return;
        }
    };
    // Installing a handler for SIGPIPE is itself what "ignores" it: without
    // one, tokio leaves the default disposition in place, which terminates
    // the process on a broken-pipe write. With one installed, the signal is
    // simply drained and dropped.
    let mut sigpipe = match signal(SignalKind::pipe()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGPIPE handler");
            return;
        }
    };

    let shutting_down = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = sigterm.recv() => {
                if begin_shutdown(&shutting_down) {
                    info!("received SIGTERM, shutting down");
                    orchestrator.shutdown().await;
                    shutdown.cancel();
                    break;
                }
            }
            _ = sigint.recv() => {
                if begin_shutdown(&shutting_down) {
                    info!("received SIGINT, shutting down");
                    orchestrator.shutdown().await;
                    shutdown.cancel();
                    break;
                }
            }
            _ = sighup.recv() => {
                if shutting_down.load(Ordering::SeqCst) {
                    continue;
                }
                info!("received SIGHUP, reloading all apps");
                for (name, result) in orchestrator.reload_all().await {
                    if let Err(e) = result {
                        warn!(app = %name, error = %e, "reload failed");
                    }
                }
            }
            _ = sigpipe.recv() => {
                debug_received_sigpipe();
            }
        }
    }
}

fn begin_shutdown(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
}

fn debug_received_sigpipe() {
    tracing::debug!("received SIGPIPE, ignoring");
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
