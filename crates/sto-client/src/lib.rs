// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client side of the sto control protocol.
//!
//! [`StoClient`] owns one connection to the server and multiplexes any number
//! of concurrent commands over it. Every command gets a fresh identifier and
//! a [`PendingReply`] future; the background reader routes each reply frame
//! to the future whose identifier it carries, in whatever order replies
//! arrive.
//!
//! The typed operations (`read_dir`, `read_file`, `write_file`, `read_link`,
//! `stat`, `run_subprocess`) sit on top of [`StoClient::send`] and decode the
//! per-method result schemas from `sto-proto`.
//!
//! ```no_run
//! use sto_client::{ClientOptions, StoClient};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StoClient::connect("/var/tmp/sto.sock", ClientOptions::default()).await?;
//! for dirent in client.read_dir("/etc").await? {
//!     println!("{} {:o}", dirent.name, dirent.mode);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
pub mod ops;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use connection::{ClientOptions, PendingReply, StoClient, DEFAULT_MAX_DIRENTS};
pub use error::{CommandError, OpError, QueueError};
pub use ops::{FileStat, SubprocessOutput};
