// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use sto_client::OpError;
use thiserror::Error;

/// A node whose read failed, with the path that identifies it
#[derive(Debug, Error)]
#[error("{path}: {source}")]
pub struct TreeError {
    pub path: String,
    #[source]
    pub source: OpError,
}

impl TreeError {
    pub fn new(path: impl Into<String>, source: OpError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    /// Negative errno-style status of the underlying failure
    pub fn status(&self) -> i32 {
        self.source.status()
    }
}
