// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::check_returncode;
use crate::{OpError, StoClient};
use sto_proto::{
    ReadFileParams, ReadFileResult, ReadLinkParams, ReadLinkResult, WriteFileParams,
    WriteFileResult, METHOD_READFILE, METHOD_READLINK, METHOD_WRITEFILE,
};
use tracing::debug;

impl StoClient {
    /// Read a remote file. A `size` of zero reads the whole file.
    pub async fn read_file(&self, path: &str, size: u32) -> Result<Vec<u8>, OpError> {
        let params = ReadFileParams {
            filepath: path.to_string(),
            size,
        };
        let result: ReadFileResult = self.request(METHOD_READFILE, &params).await?;
        check_returncode(METHOD_READFILE, path, result.returncode)?;

        debug!(operation = "read_file", path, bytes = result.buf.len(), "read file");
        Ok(result.buf.into_bytes())
    }

    /// Replace the contents of a remote file.
    ///
    /// The wire carries text, so `buf` must be valid UTF-8; anything else is
    /// rejected before the command is sent.
    pub async fn write_file(&self, path: &str, buf: &[u8]) -> Result<i32, OpError> {
        let text = std::str::from_utf8(buf).map_err(|err| OpError::NotText {
            path: path.to_string(),
            offset: err.valid_up_to(),
        })?;

        let params = WriteFileParams {
            filepath: path.to_string(),
            oflag: None,
            buf: text.to_string(),
        };
        let result: WriteFileResult = self.request(METHOD_WRITEFILE, &params).await?;
        check_returncode(METHOD_WRITEFILE, path, result.returncode)?;

        debug!(operation = "write_file", path, bytes = buf.len(), "wrote file");
        Ok(result.returncode)
    }

    /// Read the target of a remote symbolic link.
    pub async fn read_link(&self, path: &str) -> Result<Vec<u8>, OpError> {
        let params = ReadLinkParams {
            filepath: path.to_string(),
        };
        let result: ReadLinkResult = self.request(METHOD_READLINK, &params).await?;
        check_returncode(METHOD_READLINK, path, result.returncode)?;

        debug!(operation = "read_link", path, target = %result.buf, "read link");
        Ok(result.buf.into_bytes())
    }
}
