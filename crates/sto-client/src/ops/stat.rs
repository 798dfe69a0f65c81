// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::check_returncode;
use crate::{OpError, StoClient};
use serde::Serialize;
use sto_proto::{FileKind, FstatParams, FstatResult, METHOD_FSTAT};

/// Metadata of a remote path
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub mode: u32,
    pub kind: FileKind,
    pub size: Option<u64>,
    pub nlink: Option<u64>,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
    pub mtime: Option<u64>,
}

impl From<FstatResult> for FileStat {
    fn from(result: FstatResult) -> Self {
        Self {
            mode: result.st_mode,
            kind: FileKind::from_mode(result.st_mode),
            size: result.st_size,
            nlink: result.st_nlink,
            uid: result.st_uid,
            gid: result.st_gid,
            mtime: result.st_mtime,
        }
    }
}

impl StoClient {
    pub async fn stat(&self, path: &str) -> Result<FileStat, OpError> {
        let params = FstatParams {
            filename: path.to_string(),
        };
        let result: FstatResult = self.request(METHOD_FSTAT, &params).await?;
        check_returncode(METHOD_FSTAT, path, result.returncode)?;
        Ok(result.into())
    }
}
