// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request and reply frames

use crate::{ProtoError, JSONRPC_VERSION};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single outgoing command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RequestFrame {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object of a failed reply
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// A reply frame as it appears on the wire.
///
/// Use [`ReplyFrame::into_payload`] to get at the outcome; a frame with both
/// `result` and `error` is treated as an error. `"result": null` is a result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Outcome carried by a reply
#[derive(Clone, Debug, PartialEq)]
pub enum ReplyPayload {
    Result(Value),
    Error(RpcError),
}

impl ReplyFrame {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn into_payload(self) -> Result<ReplyPayload, ProtoError> {
        match (self.result, self.error) {
            (_, Some(err)) => Ok(ReplyPayload::Error(err)),
            (Some(value), None) => Ok(ReplyPayload::Result(value)),
            (None, None) => Err(ProtoError::EmptyReply { id: self.id }),
        }
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)`; only a missing field is `None`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Serialize a request as one newline-terminated line.
pub fn encode_request(frame: &RequestFrame) -> Result<Vec<u8>, ProtoError> {
    let mut line = serde_json::to_vec(frame).map_err(ProtoError::Encode)?;
    line.push(b'\n');
    Ok(line)
}

/// Serialize a reply as one newline-terminated line.
pub fn encode_reply(frame: &ReplyFrame) -> Result<Vec<u8>, ProtoError> {
    let mut line = serde_json::to_vec(frame).map_err(ProtoError::Encode)?;
    line.push(b'\n');
    Ok(line)
}

/// Parse one line (trailing newline optional) into a reply frame.
pub fn decode_reply(line: &str) -> Result<ReplyFrame, ProtoError> {
    let frame: ReplyFrame = serde_json::from_str(line.trim_end()).map_err(ProtoError::Decode)?;
    if frame.jsonrpc != JSONRPC_VERSION {
        return Err(ProtoError::Version(frame.jsonrpc));
    }
    Ok(frame)
}

/// Parse one line into a request frame. Used by the server side of tests.
pub fn decode_request(line: &str) -> Result<RequestFrame, ProtoError> {
    let frame: RequestFrame = serde_json::from_str(line.trim_end()).map_err(ProtoError::Decode)?;
    if frame.jsonrpc != JSONRPC_VERSION {
        return Err(ProtoError::Version(frame.jsonrpc));
    }
    Ok(frame)
}
