// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use serde_json::{json, Value};
use sto_client::test_utils::{FakeFs, FakeServer, DIR_MODE, FILE_MODE, LINK_MODE};
use sto_client::{OpError, StoClient};
use sto_config::ControlConfig;
use sto_control::{
    builtin_components, client_options, dispatch, ControlRequest, DispatchError, OpContext,
};

fn sample_fs() -> FakeFs {
    FakeFs::new()
        .dir("/srv")
        .file("/srv/motd", "hello")
        .link("/srv/current", "motd")
        .dir("/srv/data")
        .file("/srv/data/a", "A")
        .dir("/srv/cache")
        .file("/srv/.hidden", "secret")
}

fn context(server: &FakeServer, config: ControlConfig) -> OpContext {
    let client = StoClient::from_stream(server.connect_duplex(), client_options(&config));
    OpContext::new(config, Some(client))
}

async fn call(ctx: &OpContext, component: &str, op: &str, params: Value) -> Result<Value, DispatchError> {
    let components = builtin_components().unwrap();
    dispatch(&components, ctx, ControlRequest::new(component, op, params)).await
}

#[tokio::test]
async fn test_readdir_reports_types_and_skips_hidden() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());

    let listing = call(&ctx, "fs", "readdir", json!({"path": "/srv"})).await.unwrap();
    assert_eq!(
        listing,
        json!([
            {"name": "motd", "mode": FILE_MODE, "type": "file"},
            {"name": "current", "mode": LINK_MODE, "type": "lnk"},
            {"name": "data", "mode": DIR_MODE, "type": "dir"},
            {"name": "cache", "mode": DIR_MODE, "type": "dir"}
        ])
    );
}

#[tokio::test]
async fn test_hidden_entries_listed_when_configured() {
    let server = sample_fs().into_server();
    let config = ControlConfig {
        skip_hidden: false,
        ..ControlConfig::default()
    };
    let ctx = context(&server, config);

    let listing = call(&ctx, "fs", "readdir", json!({"path": "/srv"})).await.unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_file_link_and_stat_operations() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());

    let file = call(&ctx, "fs", "readfile", json!({"path": "/srv/motd"})).await.unwrap();
    assert_eq!(file, json!({"content": "hello"}));

    let link = call(&ctx, "fs", "readlink", json!({"path": "/srv/current"})).await.unwrap();
    assert_eq!(link, json!({"target": "motd"}));

    let stat = call(&ctx, "fs", "stat", json!({"path": "/srv/data"})).await.unwrap();
    assert_eq!(stat["kind"], "dir");
    assert_eq!(stat["mode"], DIR_MODE);

    let written = call(&ctx, "fs", "writefile", json!({"path": "/srv/new", "content": "x"}))
        .await
        .unwrap();
    assert_eq!(written, json!({"returncode": 0}));
    let request = server.requests().into_iter().find(|r| r.method == "writefile").unwrap();
    assert_eq!(request.params["filepath"], "/srv/new");
}

#[tokio::test]
async fn test_tree_uses_configured_defaults() {
    let server = sample_fs().into_server();
    let mut config = ControlConfig::default();
    config.tree.exclude = vec!["cache".to_string()];
    let ctx = context(&server, config);

    let tree = call(&ctx, "fs", "tree", json!({"path": "/srv"})).await.unwrap();
    let names: Vec<_> = tree["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|child| child["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["motd", "current", "data"]);
    assert_eq!(tree["children"][2]["children"][0], json!({"name": "a", "type": "file", "content": "A"}));

    // explicit parameters override the configuration
    let tree = call(&ctx, "fs", "tree", json!({"path": "/srv", "only_dirs": true, "exclude": []}))
        .await
        .unwrap();
    let names: Vec<_> = tree["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|child| child["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["data", "cache"]);
}

#[tokio::test]
async fn test_tree_failure_surfaces_first_error() {
    let server = sample_fs().fail("/srv/data/a", -libc::EACCES).into_server();
    let ctx = context(&server, ControlConfig::default());

    let err = call(&ctx, "fs", "tree", json!({"path": "/srv"})).await.unwrap_err();
    match &err {
        DispatchError::Tree(tree) => assert_eq!(tree.path, "/srv/data/a"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status(), -libc::EACCES);
}

#[tokio::test]
async fn test_subprocess_run() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());

    let output = call(&ctx, "subprocess", "run", json!({"cmd": ["echo", "hi"]})).await.unwrap();
    assert_eq!(output, json!({"returncode": 0, "output": "hi\n"}));

    let err = call(&ctx, "subprocess", "run", json!({"cmd": ["false"]})).await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Op(OpError::CommandFailed { returncode: 1, .. })
    ));
}

#[tokio::test]
async fn test_remote_error_maps_to_status() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());

    let err = call(&ctx, "fs", "readfile", json!({"path": "/nope"})).await.unwrap_err();
    assert!(matches!(err, DispatchError::Op(OpError::Remote { .. })));
    assert_eq!(err.status(), -libc::ENOENT);
}

#[tokio::test]
async fn test_invalid_params_rejected_before_any_request() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());

    let err = call(&ctx, "fs", "readdir", json!({"dir": "/srv"})).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidParams { .. }));
    assert_eq!(err.status(), -libc::EINVAL);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_ping_works_without_connection() {
    let ctx = OpContext::new(ControlConfig::default(), None);
    let pong = call(&ctx, "core", "ping", Value::Null).await.unwrap();
    assert_eq!(pong["connected"], false);
    assert_eq!(pong["max-dirents"], 256);

    let err = call(&ctx, "fs", "stat", json!({"path": "/"})).await.unwrap_err();
    assert!(matches!(err, DispatchError::NotConnected));
}

#[tokio::test]
async fn test_shutdown_closes_connection() {
    let server = sample_fs().into_server();
    let ctx = context(&server, ControlConfig::default());
    ctx.shutdown().await;

    let err = call(&ctx, "fs", "readdir", json!({"path": "/srv"})).await.unwrap_err();
    assert!(matches!(err, DispatchError::Op(OpError::Queue(_))));
}
