// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Control plane for sto servers.
//!
//! Operations are grouped into named components held in a [`Components`]
//! registry. A [`ControlRequest`] names a component, an operation and its
//! JSON parameters; [`dispatch`] routes it and returns the JSON result.

pub mod dispatch;
pub mod operations;
pub mod registry;

pub use dispatch::{
    client_options, dispatch, parse_params, Component, ComponentInfo, Components, ControlRequest,
    DispatchError, OpContext, OpInfo, Operation,
};
pub use operations::builtin_components;
pub use registry::{Registry, RegistryError};
