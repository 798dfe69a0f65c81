// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed remote operations.
//!
//! Each operation serializes its parameter struct, awaits the correlated
//! reply, decodes the method's result schema and turns a non-zero
//! `returncode` into [`OpError::Remote`].

mod aio;
mod readdir;
mod stat;
mod subprocess;

pub use stat::FileStat;
pub use subprocess::SubprocessOutput;

use crate::{OpError, StoClient};
use serde::de::DeserializeOwned;
use serde::Serialize;

impl StoClient {
    /// Send `params` to `method` and decode the reply into `R`.
    pub(crate) async fn request<P, R>(&self, method: &'static str, params: &P) -> Result<R, OpError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self
            .send(method, params)
            .await?
            .await
            .map_err(|source| OpError::Command { method, source })?;

        serde_json::from_value(value).map_err(|source| OpError::Decode { method, source })
    }
}

fn check_returncode(method: &'static str, path: &str, returncode: i32) -> Result<(), OpError> {
    if returncode == 0 {
        Ok(())
    } else {
        Err(OpError::Remote {
            method,
            path: path.to_string(),
            returncode,
        })
    }
}
