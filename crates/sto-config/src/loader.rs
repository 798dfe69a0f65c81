// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! TOML layer loading

use anyhow::{Context, Result};
use serde_json::Value as J;
use std::path::Path;

/// Parse a TOML document into a JSON value for merging
pub fn parse_toml_to_json(toml_str: &str) -> Result<J> {
    let toml: toml::Value = toml_str.parse::<toml::Value>()?;
    serde_json::to_value(toml).context("converting TOML to JSON")
}

/// Where a layer came from, lowest precedence first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    System,
    User,
    CliConfig,
    Env,
    Flags,
}

/// One configuration layer
#[derive(Debug, Clone)]
pub struct Layer {
    pub scope: Scope,
    pub json: J,
}

pub fn read_layer_from_file(path: &Path, scope: Scope) -> Result<Layer> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading config file {:?}", path))?;

    let json =
        parse_toml_to_json(&content).with_context(|| format!("parsing config file {:?}", path))?;

    Ok(Layer { scope, json })
}
