// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Synchronous failures of `connect` and `send`.
///
/// When `send` returns one of these, nothing was registered and no
/// completion will ever be delivered for the command.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to {path}: {source}")]
    NotConnected {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection is closed")]
    Closed,

    #[error("failed to serialize parameters for {method}: {source}")]
    Serialize {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write command: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures delivered through a command's completion
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("no reply within {0:?}")]
    TimedOut(Duration),

    #[error("server error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl CommandError {
    /// Negative errno-style status for this failure
    pub fn status(&self) -> i32 {
        match self {
            CommandError::ConnectionClosed => -libc::ECONNRESET,
            CommandError::TimedOut(_) => -libc::ETIMEDOUT,
            CommandError::Rpc { .. } => -libc::EREMOTEIO,
            CommandError::Malformed(_) => -libc::EPROTO,
        }
    }
}

/// Failures of the typed remote operations
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{method} failed: {source}")]
    Command {
        method: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("failed to decode {method} result: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} {path}: remote returned {returncode}")]
    Remote {
        method: &'static str,
        path: String,
        returncode: i32,
    },

    #[error("{path}: listing has {count} entries, limit is {limit}")]
    TooManyEntries {
        path: String,
        count: usize,
        limit: usize,
    },

    #[error("`{cmd}` exited with {returncode}")]
    CommandFailed {
        cmd: String,
        returncode: i32,
        output: Option<String>,
    },

    #[error("subprocess command line is empty")]
    EmptyArgv,

    #[error("{path}: payload is not valid UTF-8 (at byte {offset})")]
    NotText { path: String, offset: usize },
}

impl OpError {
    /// Negative errno-style status for this failure
    pub fn status(&self) -> i32 {
        match self {
            OpError::Queue(QueueError::Closed) | OpError::Queue(QueueError::NotConnected { .. }) => {
                -libc::ENOTCONN
            }
            OpError::Queue(_) => -libc::EIO,
            OpError::Command { source, .. } => source.status(),
            OpError::Decode { .. } => -libc::EPROTO,
            OpError::Remote { returncode, .. } | OpError::CommandFailed { returncode, .. } => {
                -returncode.abs()
            }
            OpError::TooManyEntries { .. } => -libc::ENOBUFS,
            OpError::EmptyArgv | OpError::NotText { .. } => -libc::EINVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses_are_negative() {
        let errors = [
            CommandError::ConnectionClosed,
            CommandError::TimedOut(Duration::from_secs(1)),
            CommandError::Rpc {
                code: -32601,
                message: "Method not found".into(),
            },
            CommandError::Malformed("x".into()),
        ];
        for err in errors {
            assert!(err.status() < 0, "{err} maps to {}", err.status());
        }
    }

    #[test]
    fn test_remote_status_keeps_errno() {
        let err = OpError::Remote {
            method: "readfile",
            path: "/missing".into(),
            returncode: -libc::ENOENT,
        };
        assert_eq!(err.status(), -libc::ENOENT);

        // some servers report positive errno values
        let err = OpError::Remote {
            method: "readfile",
            path: "/missing".into(),
            returncode: libc::ENOENT,
        };
        assert_eq!(err.status(), -libc::ENOENT);
    }
}
