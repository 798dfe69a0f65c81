// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Environment and flag overlays

use anyhow::Result;
use serde_json::Value as J;
use std::collections::HashMap;

/// Overlay built from `STO_*` variables of the process environment.
///
/// `STO_SOCKET_PATH` becomes `socket-path`; a double underscore nests, so
/// `STO_TREE__ONLY_DIRS` becomes `tree.only-dirs`.
pub fn env_overlay() -> Result<J> {
    overlay(None)
}

/// Same as [`env_overlay`] over an explicit variable set.
pub fn env_overlay_from(vars: HashMap<String, String>) -> Result<J> {
    overlay(Some(vars))
}

fn overlay(vars: Option<HashMap<String, String>>) -> Result<J> {
    let built = config::Config::builder()
        .add_source(
            config::Environment::with_prefix("STO")
                .prefix_separator("_")
                .separator("__")
                .convert_case(config::Case::Kebab)
                .try_parsing(true)
                .source(vars),
        )
        .build()?;

    Ok(serde_json::to_value(built.try_deserialize::<serde_json::Map<String, J>>()?)?)
}

/// Overlay built from command-line flags given as dotted keys
pub fn flags_overlay(pairs: &[(&str, J)]) -> J {
    let mut root = serde_json::json!({});
    for (key, value) in pairs {
        crate::merge::insert_dotted(&mut root, key, value.clone());
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_env_keys_become_kebab_case() {
        let overlay = env_overlay_from(vars(&[
            ("STO_SOCKET_PATH", "/run/sto.sock"),
            ("STO_REQUEST_TIMEOUT_MS", "5000"),
            ("STO_TREE__ONLY_DIRS", "true"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert_eq!(overlay["socket-path"], json!("/run/sto.sock"));
        assert_eq!(overlay["request-timeout-ms"], json!(5000));
        assert_eq!(overlay["tree"]["only-dirs"], json!(true));
        assert!(overlay.get("unrelated").is_none());
    }

    #[test]
    fn test_flags_overlay_nests_dotted_keys() {
        let overlay = flags_overlay(&[("tree.depth", json!(3)), ("socket-path", json!("/s"))]);
        assert_eq!(overlay, json!({"tree": {"depth": 3}, "socket-path": "/s"}));
    }
}
