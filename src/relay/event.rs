// src/relay/event.rs
//! Per-line decoding of the upstream NDJSON stream and the SSE frame we emit.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Discriminator value that carries user-visible content.
pub const ITEM_TYPE: &str = "item";

/// One decoded upstream line. Only `type == "item"` with string content matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub kind: Option<String>,
    pub content: Option<String>,
}

impl UpstreamEvent {
    /// The fragment to forward, if this event carries one.
    pub fn fragment(&self) -> Option<&str> {
        match (self.kind.as_deref(), self.content.as_deref()) {
            (Some(ITEM_TYPE), Some(c)) if !c.is_empty() => Some(c),
            _ => None,
        }
    }
}

/// A single malformed line. Always recovered by skipping the line.
#[derive(Debug, Error)]
pub enum LineDecodeError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("line is JSON but not an object")]
    NotAnObject,
}

impl LineDecodeError {
    /// Short, stable label used in logs and the drop counter.
    pub fn reason_code(&self) -> &'static str {
        match self {
            LineDecodeError::InvalidJson(_) => "invalid_json",
            LineDecodeError::NotAnObject => "not_an_object",
        }
    }
}

/// Decode one complete line (terminator already removed).
pub fn decode_line(line: &[u8]) -> Result<UpstreamEvent, LineDecodeError> {
    let value: Value = serde_json::from_slice(line).map_err(LineDecodeError::InvalidJson)?;
    let obj = value.as_object().ok_or(LineDecodeError::NotAnObject)?;
    Ok(UpstreamEvent {
        kind: obj.get("type").and_then(Value::as_str).map(str::to_owned),
        content: obj.get("content").and_then(Value::as_str).map(str::to_owned),
    })
}

/// The unit sent downstream: `data: {"content":"..."}\n\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayFrame {
    pub content: String,
}

impl RelayFrame {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("data: {json}\n\n"))
    }
}
