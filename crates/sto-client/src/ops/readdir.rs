// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::check_returncode;
use crate::{OpError, StoClient};
use sto_proto::{Dirent, ReadDirParams, ReadDirResult, METHOD_READDIR};
use tracing::debug;

impl StoClient {
    /// List a remote directory.
    ///
    /// Entries come back in server order. A listing longer than
    /// `max_dirents` fails with [`OpError::TooManyEntries`] instead of being
    /// truncated.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<Dirent>, OpError> {
        let params = ReadDirParams {
            dirpath: path.to_string(),
            skip_hidden: self.options().skip_hidden,
        };
        let result: ReadDirResult = self.request(METHOD_READDIR, &params).await?;
        check_returncode(METHOD_READDIR, path, result.returncode)?;

        let limit = self.options().max_dirents;
        if result.dirents.len() > limit {
            return Err(OpError::TooManyEntries {
                path: path.to_string(),
                count: result.dirents.len(),
                limit,
            });
        }

        debug!(operation = "read_dir", path, entries = result.dirents.len(), "listed directory");
        Ok(result.dirents)
    }
}
