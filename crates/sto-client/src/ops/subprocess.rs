// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use crate::{OpError, StoClient};
use serde::Serialize;
use sto_proto::{SubprocessParams, SubprocessResult, METHOD_SUBPROCESS};
use tracing::{debug, warn};

/// Outcome of a successful remote command
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubprocessOutput {
    pub returncode: i32,
    /// Combined output, present when capture was requested
    pub output: Option<String>,
}

impl StoClient {
    /// Run `argv` on the server.
    ///
    /// A non-zero exit status becomes [`OpError::CommandFailed`], which still
    /// carries any captured output.
    pub async fn run_subprocess(
        &self,
        argv: &[String],
        capture_output: bool,
    ) -> Result<SubprocessOutput, OpError> {
        if argv.is_empty() {
            return Err(OpError::EmptyArgv);
        }

        let params = SubprocessParams {
            cmd: argv.to_vec(),
            capture_output,
        };
        let result: SubprocessResult = self.request(METHOD_SUBPROCESS, &params).await?;

        let cmd = argv.join(" ");
        if result.returncode != 0 {
            warn!(
                operation = "run_subprocess",
                cmd = %cmd,
                returncode = result.returncode,
                "remote command failed"
            );
            return Err(OpError::CommandFailed {
                cmd,
                returncode: result.returncode,
                output: result.output,
            });
        }

        debug!(operation = "run_subprocess", cmd = %cmd, "remote command finished");
        Ok(SubprocessOutput {
            returncode: result.returncode,
            output: result.output,
        })
    }
}
