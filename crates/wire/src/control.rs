// SPDX-License-Identifier: MIT

//! Control protocol: CLI <-> master request/response/stream framing (§6, C12).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `{"id":"<uuid>","cmd":"<name>","args":{...}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlRequest {
    pub id: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Value,
}

impl ControlRequest {
    pub fn new(cmd: impl Into<String>, args: Value) -> Self {
        Self { id: Uuid::new_v4().to_string(), cmd: cmd.into(), args }
    }
}

/// `{"id":"<same>","ok":true,"data":<any>}` or `{"id":"<same>","ok":false,"error":"<msg>"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlResponse {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), ok: true, data: Some(data), error: None }
    }

    pub fn err(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { id: id.into(), ok: false, data: None, error: Some(message.into()) }
    }
}

/// `{"id":"<same>","stream":true,"data":<any>,"done"?:true}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    pub id: String,
    pub stream: bool,
    pub data: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

impl StreamChunk {
    pub fn chunk(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), stream: true, data, done: false }
    }

    pub fn last(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), stream: true, data, done: true }
    }
}

/// Fixed dispatch-table command names (C13). The control server accepts
/// exactly these; anything else is a validation error at the handler layer.
pub const COMMANDS: &[&str] = &[
    "start", "stop", "restart", "reload", "delete", "list", "status", "logs", "metrics", "dump", "ping",
    "shutdown",
];

/// Commands that use the streaming response shape instead of request/response.
pub fn is_streaming_command(cmd: &str) -> bool {
    matches!(cmd, "logs" | "metrics")
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
