// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote directory tree discovery.
//!
//! [`TreeBuilder::resolve`] walks a directory on the sto server, issuing one
//! read per discovered node (`readdir` for directories, `readfile` for files,
//! `readlink` for symlinks). Children of a directory are read concurrently;
//! the directory resolves once the last of them has. A failed read marks that
//! node and is reported as the tree's first error, but never cancels sibling
//! reads.

mod builder;
mod error;
mod node;

pub use builder::{ResolvedTree, TreeBuilder, TreeParams, TreeStats};
pub use error::TreeError;
pub use node::{FsNode, NodeKind};
