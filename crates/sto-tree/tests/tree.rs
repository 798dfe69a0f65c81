// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde_json::json;
use std::time::Duration;
use sto_client::test_utils::{FakeFs, FakeServer, Reply};
use sto_client::{ClientOptions, OpError, StoClient};
use sto_proto::FileKind;
use sto_tree::{FsNode, NodeKind, TreeBuilder, TreeParams};

fn reads(server: &FakeServer) -> usize {
    server.count("readdir") + server.count("readfile") + server.count("readlink")
}

fn client_for(server: &FakeServer) -> StoClient {
    StoClient::from_stream(server.connect_duplex(), ClientOptions::default())
}

#[tokio::test]
async fn test_small_tree_scenario() {
    let server = FakeFs::new().dir("/a").file("/a/f1", "hello").dir("/a/d1").into_server();
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/a").await;
    assert!(tree.error.is_none());
    assert_eq!(reads(&server), 3);
    assert_eq!(tree.stats().rpcs, 3);

    let root = tree.into_result().unwrap();
    assert_eq!(root.file_kind(), FileKind::Directory);
    let children = root.children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name, "f1");
    assert_eq!(children[0].content(), Some(&b"hello"[..]));
    assert_eq!(children[1].name, "d1");
    assert!(children[1].is_dir());
    assert!(children[1].children().is_empty());
}

/// Builds a tree where every directory above `depth` has `branching`
/// subdirectories and the bottom level holds files.
fn balanced_fs(branching: usize, depth: usize) -> FakeFs {
    fn fill(fs: FakeFs, path: &str, level: usize, branching: usize, depth: usize) -> FakeFs {
        let mut fs = fs;
        for i in 0..branching {
            let child = format!("{path}/n{i}");
            if level + 1 == depth {
                fs = fs.file(&child, &child);
            } else {
                fs = fill(fs.dir(&child), &child, level + 1, branching, depth);
            }
        }
        fs
    }
    fill(FakeFs::new().dir("/r"), "/r", 0, branching, depth)
}

#[tokio::test]
async fn test_one_read_per_node() {
    for (branching, depth) in [(2, 2), (3, 3), (1, 4)] {
        let server = balanced_fs(branching, depth).into_server();
        let client = client_for(&server);

        let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/r").await;
        let expected: usize = (0..=depth as u32).map(|level| branching.pow(level)).sum();
        assert_eq!(reads(&server), expected, "B={branching} D={depth}");

        let mut nodes = 0;
        tree.root.visit(&mut |_| nodes += 1);
        assert_eq!(nodes, expected);
        assert!(tree.error.is_none());
        assert_eq!(client.in_flight(), 0);
    }
}

#[tokio::test]
async fn test_oversized_directory_fails_only_itself() {
    let mut fs = FakeFs::new()
        .dir("/a")
        .dir("/a/ok")
        .file("/a/ok/x", "kept")
        .dir("/a/big");
    for i in 0..257 {
        fs = fs.file(&format!("/a/big/f{i}"), "");
    }
    let client = client_for(&fs.into_server());

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/a").await;

    let err = tree.error.as_ref().unwrap();
    assert_eq!(err.path, "/a/big");
    assert!(matches!(err.source, OpError::TooManyEntries { count: 257, limit: 256, .. }));

    let ok = tree.find("/a/ok/x").unwrap();
    assert_eq!(ok.content(), Some(&b"kept"[..]));
    let big = tree.find("/a/big").unwrap();
    assert!(big.error.is_some());
    assert!(big.children().is_empty());
}

#[tokio::test]
async fn test_failed_leaf_keeps_siblings() {
    let server = FakeFs::new()
        .dir("/d")
        .file("/d/one", "1")
        .file("/d/two", "2")
        .file("/d/three", "3")
        .fail("/d/two", -libc::EIO)
        .into_server();
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/d").await;
    assert_eq!(reads(&server), 4);

    let stats = tree.stats();
    assert_eq!(stats.files, 3);
    assert_eq!(stats.failed, 1);

    assert_eq!(tree.find("/d/one").unwrap().content(), Some(&b"1"[..]));
    assert_eq!(tree.find("/d/three").unwrap().content(), Some(&b"3"[..]));
    assert!(tree.find("/d/two").unwrap().error.is_some());

    let err = tree.into_result().unwrap_err();
    assert_eq!(err.path, "/d/two");
    assert_eq!(err.status(), -libc::EIO);
}

#[tokio::test]
async fn test_first_error_is_first_to_complete() {
    let fs = FakeFs::new()
        .dir("/d")
        .file("/d/slow", "")
        .file("/d/fast", "")
        .fail("/d/slow", -libc::EIO)
        .fail("/d/fast", -libc::EACCES);
    let server = FakeServer::new(move |method, params| {
        let reply = fs.handle(method, params);
        if params["filepath"] == "/d/slow" {
            reply.after(Duration::from_millis(50))
        } else {
            reply
        }
    });
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/d").await;
    let err = tree.error.unwrap();
    assert_eq!(err.path, "/d/fast");
    // listing order survives out-of-order completion
    let names: Vec<_> = tree.root.children().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["slow", "fast"]);
}

#[tokio::test]
async fn test_unsupported_entries_issue_no_read() {
    let server = FakeFs::new().dir("/dev").fifo("/dev/pipe").file("/dev/null", "").into_server();
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/dev").await;
    assert_eq!(reads(&server), 2);
    assert_eq!(tree.find("/dev/pipe").unwrap().kind, NodeKind::Unsupported);
    assert_eq!(tree.stats().unsupported, 1);
}

#[tokio::test]
async fn test_depth_exclude_and_only_dirs() {
    let fs = FakeFs::new()
        .dir("/")
        .dir("/etc")
        .file("/etc/hosts", "")
        .dir("/etc/ssh")
        .file("/etc/ssh/sshd_config", "")
        .dir("/proc")
        .file("/motd", "hi");
    let server = fs.into_server();
    let client = client_for(&server);

    let params = TreeParams {
        depth: 2,
        only_dirs: true,
        exclude: vec!["proc".to_string()],
        stat_root: false,
    };
    let tree = TreeBuilder::new(&client, params).resolve("/").await;
    assert!(tree.error.is_none());

    let root = &tree.root;
    let names: Vec<_> = root.children().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["etc"]);
    let ssh = tree.find("/etc/ssh").unwrap();
    assert_eq!(ssh.level, 2);
    assert!(ssh.children().is_empty());
    // "/" and "/etc" listed; "/etc/ssh" sits at the depth limit
    assert_eq!(reads(&server), 2);
}

#[tokio::test]
async fn test_stat_root_detects_plain_file() {
    let server = FakeFs::new().file("/etc/motd", "welcome").into_server();
    let client = client_for(&server);

    let params = TreeParams {
        stat_root: true,
        ..TreeParams::default()
    };
    let tree = TreeBuilder::new(&client, params).resolve("/etc/motd").await;
    let root = tree.into_result().unwrap();
    assert_eq!(root.name, "motd");
    assert_eq!(root.content(), Some(&b"welcome"[..]));
    assert_eq!(server.count("fstat"), 1);
    assert_eq!(server.count("readdir"), 0);
}

#[tokio::test]
async fn test_symlink_resolution_inside_tree() {
    let server = FakeFs::new()
        .dir("/a")
        .dir("/a/b")
        .file("/a/b/target", "data")
        .link("/a/b/same", "./target")
        .dir("/a/c")
        .link("/a/c/up", "../b/target")
        .link("/a/c/abs", "/a/b/target")
        .link("/a/c/out", "../../../etc")
        .into_server();
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/a").await;
    assert!(tree.error.is_none());
    assert_eq!(tree.stats().links, 4);

    for link in ["/a/b/same", "/a/c/up", "/a/c/abs"] {
        let node = tree.find(link).unwrap();
        let resolved = tree.resolve_link(node).unwrap();
        assert_eq!(resolved.path, "/a/b/target", "{link}");
    }
    assert!(tree.resolve_link(tree.find("/a/c/out").unwrap()).is_none());
    assert!(tree.resolve_link(tree.find("/a/b").unwrap()).is_none());
}

#[tokio::test]
async fn test_connection_loss_mid_traversal_resolves_with_error() {
    let fs = FakeFs::new().dir("/a").file("/a/f", "x").dir("/a/d");
    let server = FakeServer::new(move |method, params| {
        if method == "readdir" && params["dirpath"] == "/a/d" {
            Reply::Hangup
        } else {
            fs.handle(method, params)
        }
    });
    let client = client_for(&server);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/a").await;
    let err = tree.error.as_ref().unwrap();
    assert!(matches!(
        err.source,
        OpError::Command {
            source: sto_client::CommandError::ConnectionClosed,
            ..
        } | OpError::Queue(_)
    ));
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn test_resolved_tree_round_trips_through_json() {
    let server = FakeFs::new()
        .dir("/a")
        .file("/a/f1", "hello")
        .link("/a/l", "f1")
        .dir("/a/d1")
        .into_server();
    let client = client_for(&server);

    let root = TreeBuilder::new(&client, TreeParams::default())
        .resolve("/a")
        .await
        .into_result()
        .unwrap();

    let text = serde_json::to_string(&root).unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&text).unwrap()["children"][1],
        json!({"name": "l", "type": "lnk", "content": "f1"})
    );
    assert_eq!(FsNode::from_json(&text, "/a").unwrap(), root);
}

#[tokio::test]
async fn test_dot_entries_are_not_followed() {
    let server = FakeServer::new(|method, params| match method {
        "readdir" if params["dirpath"] == "/a" => Reply::Result(json!({
            "returncode": 0,
            "dirents": [
                {"name": ".", "mode": 0o040755},
                {"name": "..", "mode": 0o040755},
                {"name": ".profile", "mode": 0o100644}
            ]
        })),
        "readdir" => Reply::Result(json!({
            "returncode": 0,
            "dirents": [{"name": ".", "mode": 0o040755}, {"name": "..", "mode": 0o040755}]
        })),
        "readfile" => Reply::Result(json!({"returncode": 0, "buf": "export X=1"})),
        _ => Reply::Error {
            code: -32601,
            message: "Method not found".to_string(),
        },
    });
    let options = ClientOptions {
        skip_hidden: false,
        ..ClientOptions::default()
    };
    let client = StoClient::from_stream(server.connect_duplex(), options);

    let tree = TreeBuilder::new(&client, TreeParams::default()).resolve("/a").await;
    assert!(tree.error.is_none());
    assert_eq!(server.requests()[0].params["skip_hidden"], false);

    let names: Vec<_> = tree.root.children().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, [".profile"]);
    assert_eq!(reads(&server), 2);
}

#[tokio::test]
async fn test_concurrent_resolves_count_their_own_reads() {
    let server = FakeFs::new()
        .dir("/small")
        .file("/small/f", "")
        .dir("/big")
        .file("/big/a", "")
        .file("/big/b", "")
        .dir("/big/c")
        .into_server();
    let client = client_for(&server);
    let builder = TreeBuilder::new(&client, TreeParams::default());

    let (small, big) = tokio::join!(builder.resolve("/small"), builder.resolve("/big"));
    assert_eq!(small.stats().rpcs, 2);
    assert_eq!(big.stats().rpcs, 4);
}
