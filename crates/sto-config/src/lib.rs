// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Layered configuration for the sto control plane.
//!
//! Layers are TOML files converted to JSON, the `STO_*` environment and
//! command-line flags. They are deep-merged in precedence order
//! (system < user < `--config` < env < flags) and the result is deserialized
//! into [`ControlConfig`], whose defaults fill every missing key.

pub mod env;
pub mod loader;
pub mod merge;
pub mod paths;

pub use loader::Scope;
pub use paths::{discover_paths, Paths};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as J;
use std::path::PathBuf;
use std::time::Duration;
use sto_logging::{CliLogLevel, LogFormat};

/// Fully resolved control-plane settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlConfig {
    /// Unix socket of the sto server
    pub socket_path: PathBuf,
    /// Per-command deadline; 0 waits forever
    pub request_timeout_ms: u64,
    /// Largest directory listing accepted from the server
    pub max_dirents: usize,
    /// Leave dot-entries out of directory listings
    pub skip_hidden: bool,
    pub tree: TreeConfig,
    pub logging: LoggingConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/tmp/sto.sock"),
            request_timeout_ms: 30_000,
            max_dirents: 256,
            skip_hidden: true,
            tree: TreeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ControlConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Defaults for tree traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TreeConfig {
    pub depth: usize,
    pub only_dirs: bool,
    #[serde(deserialize_with = "string_or_list")]
    pub exclude: Vec<String>,
    pub stat_root: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    pub log_level: CliLogLevel,
    pub log_format: LogFormat,
}

/// Accepts `["a", "b"]` as well as `"a,b"`, the form environment variables use
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect(),
    })
}

/// Merged JSON alongside the typed configuration
#[derive(Debug)]
pub struct Resolved {
    pub json: J,
    pub config: ControlConfig,
    /// Scopes that contributed at least one layer
    pub scopes: Vec<Scope>,
}

/// Load and merge all layers, reading `STO_*` from the process environment.
pub fn load_all(paths: &Paths, flags: &[(&str, J)]) -> Result<Resolved> {
    load_with_env(paths, env::env_overlay()?, flags)
}

/// Load and merge all layers with an explicit environment overlay.
pub fn load_with_env(paths: &Paths, env_layer: J, flags: &[(&str, J)]) -> Result<Resolved> {
    use Scope::*;

    let mut layers = Vec::new();
    for (path, scope) in [(&paths.system, System), (&paths.user, User)] {
        if let Some(path) = path.as_ref().filter(|p| p.exists()) {
            layers.push(loader::read_layer_from_file(path, scope)?);
        }
    }
    if let Some(path) = &paths.cli_config {
        layers.push(loader::read_layer_from_file(path, CliConfig)?);
    }
    layers.push(loader::Layer {
        scope: Env,
        json: env_layer,
    });
    layers.push(loader::Layer {
        scope: Flags,
        json: env::flags_overlay(flags),
    });

    let mut json = serde_json::json!({});
    let mut scopes = Vec::new();
    for layer in layers {
        if layer.json.as_object().is_some_and(|map| !map.is_empty()) {
            scopes.push(layer.scope);
        }
        merge::merge_two_json(&mut json, layer.json);
    }

    let config: ControlConfig =
        serde_json::from_value(json.clone()).context("invalid sto configuration")?;

    Ok(Resolved {
        json,
        config,
        scopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_toml(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_layers() {
        let resolved = load_with_env(&Paths::default(), json!({}), &[]).unwrap();
        assert_eq!(resolved.config, ControlConfig::default());
        assert_eq!(resolved.config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(resolved.scopes.is_empty());
    }

    #[test]
    fn test_precedence_file_env_flags() {
        let dir = tempfile::tempdir().unwrap();
        let user = write_toml(
            &dir,
            "user.toml",
            r#"
socket-path = "/user.sock"
max-dirents = 64

[tree]
exclude = ["proc", "sys"]
depth = 4
"#,
        );
        let explicit = write_toml(&dir, "explicit.toml", "socket-path = \"/explicit.sock\"\n");

        let paths = Paths {
            system: Some(dir.path().join("missing.toml")),
            user: Some(user),
            cli_config: Some(explicit),
        };
        let env = json!({"request-timeout-ms": 0, "tree": {"exclude": "dev, run"}});
        let flags = [("tree.depth", json!(1))];

        let resolved = load_with_env(&paths, env, &flags).unwrap();
        let config = resolved.config;
        assert_eq!(config.socket_path, PathBuf::from("/explicit.sock"));
        assert_eq!(config.max_dirents, 64);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.tree.exclude, ["dev", "run"]);
        assert_eq!(config.tree.depth, 1);
        assert_eq!(resolved.scopes, [Scope::User, Scope::CliConfig, Scope::Env, Scope::Flags]);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::only(dir.path().join("nope.toml"));
        assert!(load_with_env(&paths, json!({}), &[]).is_err());
    }

    #[test]
    fn test_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "c.toml", "[logging]\nlog-level = \"debug\"\nlog-format = \"json\"\n");
        let config = load_with_env(&Paths::only(path), json!({}), &[]).unwrap().config;
        assert_eq!(config.logging.log_level, CliLogLevel::Debug);
        assert_eq!(config.logging.log_format, LogFormat::Json);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_toml(&dir, "c.toml", "max-dirents = \"many\"\n");
        let err = load_with_env(&Paths::only(path), json!({}), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("invalid sto configuration"));
    }
}
