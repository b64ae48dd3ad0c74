// SPDX-License-Identifier: MIT

//! Newline-delimited JSON framing (C1).
//!
//! Wire format: the textual JSON form of a message followed by a single
//! `\n`. Decoding tolerates frames arriving fragmented across reads and
//! multiple frames per read by keeping a per-connection residual buffer;
//! any line that isn't a JSON *object* (arrays, scalars, malformed text) is
//! silently dropped rather than treated as fatal.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("failed to serialize message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a single message as its NDJSON frame (JSON text + `\n`).
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode as many complete frames as `buf` contains, returning the parsed
/// messages and leaving any trailing partial line in `buf`. Lines that parse
/// as JSON but are not an object, or that fail to parse at all, are dropped
/// without consuming their neighbors (P6).
pub fn decode<T: DeserializeOwned>(buf: &mut Vec<u8>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        let Some(newline_pos) = buf.iter().position(|&b| b == b'\n') else {
            break;
        };
        let line: Vec<u8> = buf.drain(..=newline_pos).collect();
        let line = &line[..line.len() - 1]; // strip the trailing \n
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(_)) => {
                if let Ok(msg) = serde_json::from_slice::<T>(line) {
                    out.push(msg);
                }
                // A well-formed object that doesn't match T's schema is also
                // dropped silently, per the codec's "never fatal" contract.
            }
            _ => continue,
        }
    }
    out
}

/// Read a single NDJSON frame from `reader`, accumulating bytes until a
/// `\n` is found. A line that doesn't parse as an object of type `T` is
/// dropped and the reader keeps waiting for the next line, matching the
/// buffered decoder's "never fatal" contract. Returns
/// [`ProtocolError::ConnectionClosed`] on EOF before a usable frame arrives.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if byte[0] == b'\n' {
            if buf.is_empty() {
                continue;
            }
            let line = std::mem::take(&mut buf);
            if let Ok(Value::Object(_)) = serde_json::from_slice::<Value>(&line) {
                if let Ok(msg) = serde_json::from_slice::<T>(&line) {
                    return Ok(msg);
                }
            }
            continue;
        }
        buf.push(byte[0]);
    }
}

/// Write a single NDJSON frame to `writer`.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(message)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
