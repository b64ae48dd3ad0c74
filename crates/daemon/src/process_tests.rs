// SPDX-License-Identifier: MIT

use super::*;
use std::collections::HashMap;

#[test]
fn master_only_keys_are_stripped() {
    std::env::set_var("SUPERVISOR_IPC_SOCKET", "/tmp/should-not-leak.sock");
    std::env::set_var("SUPERVISOR_STATE_DIR", "/tmp/should-not-leak");

    let worker_env = HashMap::new();
    let overlay = HashMap::new();
    let env = build_worker_env(&worker_env, &overlay);

    assert!(env.iter().all(|(k, _)| !k.starts_with(MASTER_ENV_PREFIX)));

    std::env::remove_var("SUPERVISOR_IPC_SOCKET");
    std::env::remove_var("SUPERVISOR_STATE_DIR");
}

#[test]
fn worker_env_overlay_wins_over_inherited_keys() {
    std::env::set_var("SV_TEST_KEY", "inherited");
    let mut worker_env = HashMap::new();
    worker_env.insert("WORKER_ID".to_string(), "3".to_string());
    worker_env.insert("SV_TEST_KEY".to_string(), "from-strategy".to_string());

    let env = build_worker_env(&worker_env, &HashMap::new());
    let value = env.iter().find(|(k, _)| k == "SV_TEST_KEY").map(|(_, v)| v.clone());
    assert_eq!(value.as_deref(), Some("from-strategy"));

    std::env::remove_var("SV_TEST_KEY");
}

#[test]
fn user_overlay_wins_over_strategy_env() {
    let mut worker_env = HashMap::new();
    worker_env.insert("PORT".to_string(), "3000".to_string());
    let mut user_overlay = HashMap::new();
    user_overlay.insert("PORT".to_string(), "4000".to_string());

    let env = build_worker_env(&worker_env, &user_overlay);
    let value = env.iter().find(|(k, _)| k == "PORT").map(|(_, v)| v.clone());
    assert_eq!(value.as_deref(), Some("4000"));
}
