// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Routing of control requests to component operations

use crate::registry::{Registry, RegistryError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use sto_client::{ClientOptions, OpError, StoClient};
use sto_config::ControlConfig;
use sto_tree::{TreeError, TreeParams};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown component {0:?}")]
    UnknownComponent(String),

    #[error("component {component:?} has no operation {op:?}")]
    UnknownOp { component: String, op: String },

    #[error("invalid parameters for {op}: {source}")]
    InvalidParams {
        op: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("operation needs a server connection")]
    NotConnected,

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl DispatchError {
    /// Negative errno-style status
    pub fn status(&self) -> i32 {
        match self {
            DispatchError::UnknownComponent(_) | DispatchError::UnknownOp { .. } => -libc::ENOENT,
            DispatchError::InvalidParams { .. } => -libc::EINVAL,
            DispatchError::NotConnected => -libc::ENOTCONN,
            DispatchError::Op(err) => err.status(),
            DispatchError::Tree(err) => err.status(),
        }
    }
}

/// Everything an operation may use while it runs
pub struct OpContext {
    config: ControlConfig,
    client: Option<StoClient>,
}

impl OpContext {
    pub fn new(config: ControlConfig, client: Option<StoClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn client(&self) -> Result<&StoClient, DispatchError> {
        self.client.as_ref().ok_or(DispatchError::NotConnected)
    }

    /// Tree defaults from configuration
    pub fn tree_params(&self) -> TreeParams {
        let tree = &self.config.tree;
        TreeParams {
            depth: tree.depth,
            only_dirs: tree.only_dirs,
            exclude: tree.exclude.clone(),
            stat_root: tree.stat_root,
        }
    }

    /// Close the server connection, failing anything still in flight.
    pub async fn shutdown(&self) {
        if let Some(client) = &self.client {
            client.close().await;
        }
    }
}

/// Connection options derived from configuration
pub fn client_options(config: &ControlConfig) -> ClientOptions {
    ClientOptions {
        request_timeout: config.request_timeout(),
        skip_hidden: config.skip_hidden,
        max_dirents: config.max_dirents,
    }
}

/// One named operation of a component
#[async_trait]
pub trait Operation: Send + Sync {
    /// One-line summary shown by `stoctl components`
    fn description(&self) -> &'static str;

    async fn run(&self, ctx: &OpContext, params: Value) -> Result<Value, DispatchError>;
}

/// Decode operation parameters; a missing (`null`) object counts as empty.
pub fn parse_params<T: DeserializeOwned>(op: &str, params: Value) -> Result<T, DispatchError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|source| DispatchError::InvalidParams {
        op: op.to_string(),
        source,
    })
}

/// A named group of operations
pub struct Component {
    pub name: String,
    /// Hidden from listings
    pub internal: bool,
    pub ops: Registry<Arc<dyn Operation>>,
}

impl Component {
    pub fn new(name: impl Into<String>, internal: bool) -> Self {
        Self {
            name: name.into(),
            internal,
            ops: Registry::new(),
        }
    }

    pub fn with_op(
        mut self,
        name: &str,
        op: impl Operation + 'static,
    ) -> Result<Self, RegistryError> {
        self.ops.add(name, Arc::new(op) as Arc<dyn Operation>)?;
        Ok(self)
    }
}

/// Listing entry for one component
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentInfo {
    pub name: String,
    pub ops: Vec<OpInfo>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpInfo {
    pub name: String,
    pub description: String,
}

/// All components known to this process
#[derive(Default)]
pub struct Components {
    registry: Registry<Component>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: Component) -> Result<(), RegistryError> {
        let name = component.name.clone();
        self.registry.add(name, component)
    }

    pub fn find(&self, name: &str, skip_internal: bool) -> Option<&Component> {
        self.registry
            .find(name)
            .filter(|component| !(skip_internal && component.internal))
    }

    pub fn list(&self, skip_internal: bool) -> Vec<ComponentInfo> {
        self.registry
            .iter()
            .filter(|(_, component)| !(skip_internal && component.internal))
            .map(|(name, component)| ComponentInfo {
                name: name.to_string(),
                ops: component
                    .ops
                    .iter()
                    .map(|(op, handler)| OpInfo {
                        name: op.to_string(),
                        description: handler.description().to_string(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// A command addressed to one operation of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub component: String,
    pub op: String,
    #[serde(default)]
    pub params: Value,
}

impl ControlRequest {
    pub fn new(component: impl Into<String>, op: impl Into<String>, params: Value) -> Self {
        Self {
            component: component.into(),
            op: op.into(),
            params,
        }
    }
}

/// Route `request` to its operation and run it.
pub async fn dispatch(
    components: &Components,
    ctx: &OpContext,
    request: ControlRequest,
) -> Result<Value, DispatchError> {
    let ControlRequest {
        component,
        op,
        params,
    } = request;

    let handler = components
        .find(&component, false)
        .ok_or_else(|| DispatchError::UnknownComponent(component.clone()))?
        .ops
        .find(&op)
        .ok_or_else(|| DispatchError::UnknownOp {
            component: component.clone(),
            op: op.clone(),
        })?;

    debug!(operation = "dispatch", component = %component, op = %op, "running operation");
    let result = handler.run(ctx, params).await;
    if let Err(err) = &result {
        warn!(operation = "dispatch", component = %component, op = %op, error = %err, "operation failed");
    }
    result
}
