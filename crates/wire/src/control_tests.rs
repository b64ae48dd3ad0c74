// SPDX-License-Identifier: MIT

use super::*;
use crate::codec::{decode, encode};

#[test]
fn request_round_trips_through_ndjson() {
    let req = ControlRequest::new("status", serde_json::json!({"name": "web"}));
    let mut buf = encode(&req).unwrap();
    let decoded: Vec<ControlRequest> = decode(&mut buf);
    assert_eq!(decoded, vec![req]);
}

#[test]
fn missing_id_or_cmd_fails_to_deserialize() {
    let bad = serde_json::json!({"args": {}});
    let result: Result<ControlRequest, _> = serde_json::from_value(bad);
    assert!(result.is_err());
}

#[test]
fn ok_and_err_responses_serialize_exclusively() {
    let ok = ControlResponse::ok("1", serde_json::json!({"running": true}));
    let value = serde_json::to_value(&ok).unwrap();
    assert_eq!(value["ok"], true);
    assert!(value.get("error").is_none());

    let err = ControlResponse::err("1", "boom");
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["ok"], false);
    assert!(value.get("data").is_none());
}

#[test]
fn stream_chunk_done_flag_omitted_when_false() {
    let chunk = StreamChunk::chunk("1", serde_json::json!("line"));
    let value = serde_json::to_value(&chunk).unwrap();
    assert!(value.get("done").is_none());

    let last = StreamChunk::last("1", serde_json::json!("line"));
    let value = serde_json::to_value(&last).unwrap();
    assert_eq!(value["done"], true);
}

#[test]
fn logs_and_metrics_are_streaming_commands() {
    assert!(is_streaming_command("logs"));
    assert!(is_streaming_command("metrics"));
    assert!(!is_streaming_command("status"));
}
