// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration file discovery

use std::path::PathBuf;

const FILE_NAME: &str = "control.toml";

/// Candidate configuration files, lowest precedence first
#[derive(Debug, Clone, Default)]
pub struct Paths {
    pub system: Option<PathBuf>,
    pub user: Option<PathBuf>,
    /// Explicit `--config` file; unlike the others it must exist
    pub cli_config: Option<PathBuf>,
}

impl Paths {
    /// Paths with nothing but an explicit file, for tests and embedding
    pub fn only(cli_config: impl Into<PathBuf>) -> Self {
        Self {
            system: None,
            user: None,
            cli_config: Some(cli_config.into()),
        }
    }
}

pub fn discover_paths(cli_config: Option<PathBuf>) -> Paths {
    Paths {
        system: Some(PathBuf::from("/etc/sto").join(FILE_NAME)),
        user: user_config_path(),
        cli_config,
    }
}

/// `$XDG_CONFIG_HOME/sto/control.toml`, falling back to the platform config dir
fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("sto").join(FILE_NAME))
}
