// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parameter and result schemas for each server method.
//!
//! Field names here are the wire contract and must not be renamed.

use serde::{Deserialize, Serialize};

pub const METHOD_READDIR: &str = "readdir";
pub const METHOD_READFILE: &str = "readfile";
pub const METHOD_WRITEFILE: &str = "writefile";
pub const METHOD_READLINK: &str = "readlink";
pub const METHOD_FSTAT: &str = "fstat";
pub const METHOD_SUBPROCESS: &str = "subprocess";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadDirParams {
    pub dirpath: String,
    pub skip_hidden: bool,
}

/// One directory entry: name plus `st_mode` bits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    pub name: String,
    pub mode: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadDirResult {
    pub returncode: i32,
    #[serde(default)]
    pub dirents: Vec<Dirent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadFileParams {
    pub filepath: String,
    pub size: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadFileResult {
    pub returncode: i32,
    #[serde(default)]
    pub buf: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteFileParams {
    pub filepath: String,
    /// open(2) flags; the server falls back to its own default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oflag: Option<i32>,
    pub buf: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteFileResult {
    pub returncode: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadLinkParams {
    pub filepath: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadLinkResult {
    pub returncode: i32,
    #[serde(default)]
    pub buf: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FstatParams {
    pub filename: String,
}

/// Result of `fstat`. Only `returncode` and `st_mode` are required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FstatResult {
    pub returncode: i32,
    #[serde(default)]
    pub st_mode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_dev: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_ino: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_nlink: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_uid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_gid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_rdev: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_blksize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_blocks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_atime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_mtime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub st_ctime: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubprocessParams {
    pub cmd: Vec<String>,
    pub capture_output: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubprocessResult {
    pub returncode: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}
