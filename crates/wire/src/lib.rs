// SPDX-License-Identifier: MIT

//! sv-wire: NDJSON framing, control protocol, and worker IPC message shapes.

pub mod codec;
pub mod control;
pub mod ipc;

pub use codec::{decode, encode, read_frame, write_frame, ProtocolError};
pub use control::{is_streaming_command, ControlRequest, ControlResponse, StreamChunk, COMMANDS};
pub use ipc::{parse_worker_message, CpuUsage, MasterMessage, MemoryUsage, WorkerMessage};
