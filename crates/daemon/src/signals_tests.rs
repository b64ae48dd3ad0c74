// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn begin_shutdown_only_wins_once() {
    let flag = AtomicBool::new(false);
    assert!(begin_shutdown(&flag));
    assert!(!begin_shutdown(&flag));
    assert!(!begin_shutdown(&flag));
}

#[tokio::test]
async fn external_shutdown_token_stops_the_loop_without_a_signal() {
    let orchestrator = Arc::new(Orchestrator::new(std::env::temp_dir()));
    let shutdown = CancellationToken::new();
    let task_shutdown = shutdown.clone();
    let handle = tokio::spawn(run(orchestrator, task_shutdown));

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle).await.unwrap().unwrap();
}
