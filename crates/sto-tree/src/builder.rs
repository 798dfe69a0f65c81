// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fan-out / fan-in traversal of a remote directory

use crate::error::TreeError;
use crate::node::{join_path, FsNode, NodeKind};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use sto_client::StoClient;
use sto_proto::FileKind;
use tracing::{debug, info, warn};

/// Traversal options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeParams {
    /// Directories at this level or deeper are not listed; 0 means unlimited
    pub depth: usize,
    /// Leave out everything that is not a directory
    pub only_dirs: bool,
    /// Entry names skipped before fan-out
    pub exclude: Vec<String>,
    /// Determine the root's type with `fstat` instead of assuming a directory
    pub stat_root: bool,
}

impl TreeParams {
    fn keeps(&self, name: &str, kind: FileKind) -> bool {
        // self and parent links would make the tree cyclic
        if name == "." || name == ".." {
            return false;
        }
        if self.exclude.iter().any(|excluded| excluded == name) {
            return false;
        }
        !self.only_dirs || kind == FileKind::Directory
    }

    fn expands(&self, level: usize) -> bool {
        self.depth == 0 || level < self.depth
    }
}

/// Counters gathered over a resolved tree
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub files: usize,
    pub dirs: usize,
    pub links: usize,
    pub unsupported: usize,
    pub failed: usize,
    /// Remote reads issued, including a root `fstat`
    pub rpcs: usize,
}

/// Outcome of [`TreeBuilder::resolve`]: the whole tree plus the first error
/// seen anywhere in it
#[derive(Debug)]
pub struct ResolvedTree {
    pub root: FsNode,
    pub error: Option<TreeError>,
    rpcs: usize,
}

impl ResolvedTree {
    /// The root, or the first error if any read failed
    pub fn into_result(self) -> Result<FsNode, TreeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.root),
        }
    }

    /// Look up a node by absolute path.
    pub fn find(&self, path: &str) -> Option<&FsNode> {
        let root_path = self.root.path.trim_end_matches('/');
        let rest = path.trim_end_matches('/').strip_prefix(root_path)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }

        rest.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(&self.root, |node, part| node.child(part))
    }

    /// Follow a symlink node to the node its target names inside this tree.
    ///
    /// Relative targets are walked from the link's parent; `..` steps up and
    /// `.` stays. Returns `None` when the target leaves the tree or does not
    /// exist in it.
    pub fn resolve_link(&self, link: &FsNode) -> Option<&FsNode> {
        let NodeKind::Symlink { target } = &link.kind else {
            return None;
        };
        let target = String::from_utf8_lossy(target);

        let mut parts: Vec<&str> = if target.starts_with('/') {
            Vec::new()
        } else {
            let (parent, _) = link.path.rsplit_once('/')?;
            parent.split('/').filter(|part| !part.is_empty()).collect()
        };

        for token in target.split('/') {
            match token {
                "" | "." => {}
                ".." => {
                    parts.pop()?;
                }
                name => parts.push(name),
            }
        }

        self.find(&format!("/{}", parts.join("/")))
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            rpcs: self.rpcs,
            ..TreeStats::default()
        };
        self.root.visit(&mut |node| {
            match node.kind {
                NodeKind::File { .. } => stats.files += 1,
                NodeKind::Directory { .. } => stats.dirs += 1,
                NodeKind::Symlink { .. } => stats.links += 1,
                NodeKind::Unsupported => stats.unsupported += 1,
            }
            if node.error.is_some() {
                stats.failed += 1;
            }
        });
        stats
    }
}

type Resolved = (FsNode, Option<TreeError>);

/// Resolves remote paths into [`FsNode`] trees over one client.
///
/// Concurrent [`TreeBuilder::resolve`] calls on one builder are independent.
pub struct TreeBuilder<'a> {
    client: &'a StoClient,
    params: TreeParams,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(client: &'a StoClient, params: TreeParams) -> Self {
        Self { client, params }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Discover the tree under `path`.
    ///
    /// Completes only after every read it started has completed.
    pub async fn resolve(&self, path: &str) -> ResolvedTree {
        let rpcs = AtomicUsize::new(0);
        let name = root_name(path);

        let kind = if self.params.stat_root {
            rpcs.fetch_add(1, Ordering::Relaxed);
            match self.client.stat(path).await {
                Ok(stat) => stat.kind,
                Err(source) => {
                    let err = TreeError::new(path, source);
                    warn!(operation = "resolve_tree", path, error = %err, "cannot stat tree root");
                    let mut root =
                        FsNode::empty(name, path.to_string(), 0, FileKind::Unsupported);
                    root.error = Some(err.to_string());
                    return ResolvedTree {
                        root,
                        error: Some(err),
                        rpcs: rpcs.load(Ordering::Relaxed),
                    };
                }
            }
        } else {
            FileKind::Directory
        };

        let root = FsNode::empty(name, path.to_string(), 0, kind);
        let (root, error) = self.resolve_node(root, &rpcs).await;
        let tree = ResolvedTree {
            root,
            error,
            rpcs: rpcs.load(Ordering::Relaxed),
        };

        match &tree.error {
            None => info!(operation = "resolve_tree", path, rpcs = tree.rpcs, "tree resolved"),
            Some(err) => {
                warn!(operation = "resolve_tree", path, rpcs = tree.rpcs, error = %err, "tree resolved with errors")
            }
        }
        tree
    }

    fn resolve_node<'s>(&'s self, node: FsNode, rpcs: &'s AtomicUsize) -> BoxFuture<'s, Resolved> {
        async move {
            match node.kind {
                NodeKind::Directory { .. } => self.resolve_dir(node, rpcs).await,
                NodeKind::File { .. } => self.resolve_leaf(node, rpcs).await,
                NodeKind::Symlink { .. } => self.resolve_leaf(node, rpcs).await,
                NodeKind::Unsupported => {
                    debug!(operation = "resolve_node", path = %node.path, "unsupported entry, not read");
                    (node, None)
                }
            }
        }
        .boxed()
    }

    async fn resolve_leaf(&self, mut node: FsNode, rpcs: &AtomicUsize) -> Resolved {
        rpcs.fetch_add(1, Ordering::Relaxed);
        let outcome = match &mut node.kind {
            NodeKind::File { content } => {
                self.client.read_file(&node.path, 0).await.map(|buf| *content = buf)
            }
            NodeKind::Symlink { target } => {
                self.client.read_link(&node.path).await.map(|buf| *target = buf)
            }
            _ => Ok(()),
        };

        match outcome {
            Ok(()) => (node, None),
            Err(source) => fail(node, source),
        }
    }

    async fn resolve_dir(&self, mut node: FsNode, rpcs: &AtomicUsize) -> Resolved {
        if !self.params.expands(node.level) {
            debug!(operation = "resolve_dir", path = %node.path, level = node.level, "depth limit reached");
            return (node, None);
        }

        rpcs.fetch_add(1, Ordering::Relaxed);
        let dirents = match self.client.read_dir(&node.path).await {
            Ok(dirents) => dirents,
            Err(source) => return fail(node, source),
        };

        let pending: Vec<FsNode> = dirents
            .into_iter()
            .filter_map(|dirent| {
                let kind = FileKind::from_mode(dirent.mode);
                self.params.keeps(&dirent.name, kind).then(|| {
                    let path = join_path(&node.path, &dirent.name);
                    FsNode::empty(dirent.name, path, node.level + 1, kind)
                })
            })
            .collect();

        debug!(operation = "resolve_dir", path = %node.path, children = pending.len(), "fanning out");

        let mut slots: Vec<Option<FsNode>> = (0..pending.len()).map(|_| None).collect();
        let mut in_flight: FuturesUnordered<_> = pending
            .into_iter()
            .enumerate()
            .map(|(index, child)| {
                self.resolve_node(child, rpcs).map(move |resolved| (index, resolved))
            })
            .collect();

        let mut first_error: Option<TreeError> = None;
        while let Some((index, (child, error))) = in_flight.next().await {
            if let Some(error) = error {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    debug!(operation = "resolve_dir", error = %error, "further error in subtree");
                }
            }
            slots[index] = Some(child);
        }

        if let NodeKind::Directory { children } = &mut node.kind {
            *children = slots.into_iter().flatten().collect();
        }
        (node, first_error)
    }
}

fn fail(mut node: FsNode, source: sto_client::OpError) -> Resolved {
    let err = TreeError::new(node.path.clone(), source);
    warn!(operation = "resolve_node", path = %node.path, error = %err.source, "read failed");
    node.error = Some(err.source.to_string());
    (node, Some(err))
}

fn root_name(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ if path.starts_with('/') => "/".to_string(),
        _ => path.to_string(),
    }
}
