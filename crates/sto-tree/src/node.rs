// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Tree nodes and their external JSON representation

use serde::{Deserialize, Serialize, Serializer};
use sto_proto::FileKind;

/// Type-specific payload of a node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File { content: Vec<u8> },
    Directory { children: Vec<FsNode> },
    Symlink { target: Vec<u8> },
    Unsupported,
}

/// One remote filesystem entry.
///
/// `path` and `level` locate the node inside the tree (the root has level 0);
/// a directory exclusively owns its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsNode {
    pub name: String,
    pub path: String,
    pub level: usize,
    pub kind: NodeKind,
    /// Set when this node's own read failed
    pub error: Option<String>,
}

impl FsNode {
    /// A node of the given type with an empty payload
    pub(crate) fn empty(name: String, path: String, level: usize, kind: FileKind) -> Self {
        let kind = match kind {
            FileKind::File => NodeKind::File {
                content: Vec::new(),
            },
            FileKind::Directory => NodeKind::Directory {
                children: Vec::new(),
            },
            FileKind::Symlink => NodeKind::Symlink { target: Vec::new() },
            FileKind::Unsupported => NodeKind::Unsupported,
        };

        Self {
            name,
            path,
            level,
            kind,
            error: None,
        }
    }

    pub fn file_kind(&self) -> FileKind {
        match self.kind {
            NodeKind::File { .. } => FileKind::File,
            NodeKind::Directory { .. } => FileKind::Directory,
            NodeKind::Symlink { .. } => FileKind::Symlink,
            NodeKind::Unsupported => FileKind::Unsupported,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Children in listing order; empty for anything but directories
    pub fn children(&self) -> &[FsNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            _ => &[],
        }
    }

    /// File content or link target
    pub fn content(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Symlink { target } => Some(target),
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&FsNode> {
        self.children().iter().find(|child| child.name == name)
    }

    /// Visit this node and every descendant, parents before children.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&FsNode),
    {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(NodeRepr::from(self)).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a tree from its JSON representation, rooted at `root_path`.
    pub fn from_json(text: &str, root_path: &str) -> Result<FsNode, serde_json::Error> {
        let repr: NodeRepr = serde_json::from_str(text)?;
        Ok(repr.into_node(root_path.to_string(), 0))
    }
}

impl Serialize for FsNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeRepr::from(self).serialize(serializer)
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[derive(Serialize, Deserialize)]
struct NodeRepr {
    name: String,
    #[serde(rename = "type")]
    kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<NodeRepr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&FsNode> for NodeRepr {
    fn from(node: &FsNode) -> Self {
        let (content, children) = match &node.kind {
            NodeKind::File { content } | NodeKind::Symlink { target: content } => {
                (Some(String::from_utf8_lossy(content).into_owned()), None)
            }
            NodeKind::Directory { children } => {
                (None, Some(children.iter().map(NodeRepr::from).collect()))
            }
            NodeKind::Unsupported => (None, None),
        };

        Self {
            name: node.name.clone(),
            kind: node.file_kind(),
            content,
            children,
            error: node.error.clone(),
        }
    }
}

impl NodeRepr {
    fn into_node(self, path: String, level: usize) -> FsNode {
        let kind = match self.kind {
            FileKind::File => NodeKind::File {
                content: self.content.unwrap_or_default().into_bytes(),
            },
            FileKind::Symlink => NodeKind::Symlink {
                target: self.content.unwrap_or_default().into_bytes(),
            },
            FileKind::Directory => NodeKind::Directory {
                children: self
                    .children
                    .unwrap_or_default()
                    .into_iter()
                    .map(|child| {
                        let child_path = join_path(&path, &child.name);
                        child.into_node(child_path, level + 1)
                    })
                    .collect(),
            },
            FileKind::Unsupported => NodeKind::Unsupported,
        };

        FsNode {
            name: self.name,
            path,
            level,
            kind,
            error: self.error,
        }
    }
}
