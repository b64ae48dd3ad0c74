// SPDX-License-Identifier: MIT

use super::*;
use crate::orchestrator::Orchestrator;
use sv_wire::ControlRequest;

#[tokio::test]
async fn ping_is_always_ok() {
    let orchestrator = Orchestrator::new(std::env::temp_dir());
    let req = ControlRequest::new("ping", json!({}));
    let response = handle_request(&orchestrator, &req).await;
    assert!(response.ok);
}

#[tokio::test]
async fn unknown_command_is_an_error() {
    let orchestrator = Orchestrator::new(std::env::temp_dir());
    let req = ControlRequest::new("frobnicate", json!({}));
    let response = handle_request(&orchestrator, &req).await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("unknown command"));
}

#[tokio::test]
async fn stop_without_a_name_argument_is_an_error() {
    let orchestrator = Orchestrator::new(std::env::temp_dir());
    let req = ControlRequest::new("stop", json!({}));
    let response = handle_request(&orchestrator, &req).await;
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("name"));
}

#[tokio::test]
async fn stop_on_a_missing_app_is_an_error() {
    let orchestrator = Orchestrator::new(std::env::temp_dir());
    let req = ControlRequest::new("stop", json!({"name": "ghost"}));
    let response = handle_request(&orchestrator, &req).await;
    assert!(!response.ok);
}

#[tokio::test]
async fn list_on_an_empty_orchestrator_is_an_empty_array() {
    let orchestrator = Orchestrator::new(std::env::temp_dir());
    let req = ControlRequest::new("list", json!({}));
    let response = handle_request(&orchestrator, &req).await;
    assert!(response.ok);
    assert_eq!(response.data.unwrap(), json!([]));
}
