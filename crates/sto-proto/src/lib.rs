// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! sto control protocol: newline-delimited JSON-RPC 2.0
//!
//! The control process writes one [`RequestFrame`] per line to the server
//! socket and reads back one [`ReplyFrame`] per line. Replies may arrive in
//! any order; the `id` field is the only correlation key.
//!
//! The per-method parameter and result structs in [`methods`] pin the field
//! names of the wire contract.

pub mod frame;
pub mod methods;
pub mod mode;

pub use frame::{
    decode_reply, decode_request, encode_reply, encode_request, ReplyFrame, ReplyPayload,
    RequestFrame, RpcError,
};
pub use methods::{
    Dirent, FstatParams, FstatResult, ReadDirParams, ReadDirResult, ReadFileParams, ReadFileResult,
    ReadLinkParams, ReadLinkResult, SubprocessParams, SubprocessResult, WriteFileParams,
    WriteFileResult, METHOD_FSTAT, METHOD_READDIR, METHOD_READFILE, METHOD_READLINK,
    METHOD_SUBPROCESS, METHOD_WRITEFILE,
};
pub use mode::{FileKind, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};

/// Protocol version string carried in every frame
pub const JSONRPC_VERSION: &str = "2.0";

/// Errors raised while encoding or decoding frames
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unsupported jsonrpc version {0:?}")]
    Version(String),
    #[error("reply {id} carries neither result nor error")]
    EmptyReply { id: u64 },
}
