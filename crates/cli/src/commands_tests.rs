// SPDX-License-Identifier: MIT

use super::*;

fn minimal_args(name: &str) -> StartArgs {
    StartArgs {
        name: name.to_string(),
        script: PathBuf::from("/bin/fake-worker"),
        interpreter: None,
        instances: "1".to_string(),
        port: None,
        env: vec![],
        cwd: None,
        max_restarts: None,
        restart_window_ms: None,
        min_uptime_ms: None,
        shutdown_signal: None,
        kill_timeout_ms: None,
        ready_timeout_ms: None,
        health_check: false,
        health_path: "/".to_string(),
        cluster: false,
        cluster_strategy: "auto".to_string(),
        no_autorestart: false,
    }
}

#[test]
fn parse_env_pair_splits_on_first_equals() {
    assert_eq!(parse_env_pair("KEY=value=with=equals").unwrap(), ("KEY".to_string(), "value=with=equals".to_string()));
    assert!(parse_env_pair("no-equals-sign").is_err());
}

#[test]
fn build_config_deserializes_into_app_config() {
    let config = build_config(minimal_args("app-a")).unwrap();
    let parsed: sv_core::AppConfig = serde_json::from_value(config).expect("build_config output must round-trip");
    assert_eq!(parsed.name, "app-a");
    assert_eq!(parsed.instances, sv_core::InstanceCount::Fixed(1));
    assert!(parsed.autorestart);
}

#[test]
fn build_config_resolves_max_instances() {
    let mut args = minimal_args("app-b");
    args.instances = "MAX".to_string();
    let config = build_config(args).unwrap();
    let parsed: sv_core::AppConfig = serde_json::from_value(config).unwrap();
    assert_eq!(parsed.instances, sv_core::InstanceCount::Max);
}

#[test]
fn build_config_rejects_unknown_shutdown_signal() {
    let mut args = minimal_args("app-c");
    args.shutdown_signal = Some("SIGQUIT".to_string());
    assert!(build_config(args).is_err());
}

#[test]
fn build_config_normalizes_cluster_strategy() {
    let mut args = minimal_args("app-d");
    args.cluster = true;
    args.cluster_strategy = "reuse-port".to_string();
    let config = build_config(args).unwrap();
    let parsed: sv_core::AppConfig = serde_json::from_value(config).unwrap();
    assert!(parsed.clustering_enabled());
}
