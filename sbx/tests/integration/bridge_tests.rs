use std::fs;
use std::time::Duration;

use sbx::{ExecutionBridge, HttpPool, PreToolUse, ToolCall, ToolUseHooks, TurnCancel};
use sbx_common::protocol::{WireArchive, WireResponse};
use sbx_common::{DataBundle, build_bundle};
use serde_json::json;
use tempfile::TempDir;

use crate::common::{
    MockPoolServer, PoolBehavior, TestDataRoot, assert_contains, assert_path_exists,
    init_test_logging,
};

fn encode_bundle(bundle: &DataBundle) -> String {
    WireArchive::from_bundle(bundle).content
}

fn decode_bundle(content: &str) -> DataBundle {
    WireResponse {
        archive: Some(content.to_string()),
        ..WireResponse::default()
    }
    .decode_archive()
    .unwrap()
    .unwrap()
}

/// Archive the pool sends back: one whitelisted file and one that is not.
fn returned_archive() -> DataBundle {
    let remote = TempDir::new().unwrap();
    fs::create_dir_all(remote.path().join("notes")).unwrap();
    fs::write(remote.path().join("notes/result.md"), "computed\n").unwrap();
    fs::create_dir_all(remote.path().join("scratch")).unwrap();
    fs::write(remote.path().join("scratch/tmp.txt"), "junk").unwrap();

    let whitelist = vec!["notes".to_string(), "scratch".to_string()];
    build_bundle(remote.path(), &whitelist).unwrap().unwrap()
}

fn shell_call(command: &str) -> ToolCall {
    ToolCall::new("run_in_terminal", json!({ "command": command }))
}

#[tokio::test]
async fn test_round_trip_uploads_data_and_merges_results() {
    init_test_logging();
    crate::test_log!("TEST START: test_round_trip_uploads_data_and_merges_results");

    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse {
        stdout: "done\n".to_string(),
        exit_status: 0,
        archive: Some(encode_bundle(&returned_archive())),
        ..WireResponse::default()
    }))
    .await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());

    let bridge = ExecutionBridge::new(HttpPool::new(None).unwrap(), &root.settings());
    let decision = bridge
        .pre_tool_use(&shell_call("make report"), &TurnCancel::never())
        .await;

    let PreToolUse::Intercepted {
        result,
        replay_command,
    } = decision
    else {
        panic!("expected interception");
    };
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.synced_files, 1);
    assert_eq!(replay_command, "printf '%s' 'done\n'");

    assert_path_exists(&root.notes.join("result.md"));
    assert!(!root.path().join("scratch").exists());

    let sent = &server.received()[0].body;
    assert_contains(&sent.script, "cd /mnt/data");
    assert!(sent.script.ends_with("make report\n"));
    let uploaded = sent.archive.as_ref().expect("data uploaded");
    let names = decode_bundle(&uploaded.content).entry_names().unwrap();
    assert!(names.contains(&"notes/todo.md".to_string()));
    assert!(names.contains(&"SOUL.md".to_string()));
    assert!(!names.iter().any(|n| n.starts_with(".azure")));

    crate::test_log!("TEST PASS: test_round_trip_uploads_data_and_merges_results");
}

#[tokio::test]
async fn test_sync_off_leaves_data_root_untouched() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse {
        exit_status: 0,
        archive: Some(encode_bundle(&returned_archive())),
        ..WireResponse::default()
    }))
    .await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());
    root.store().set_sync_data(false).unwrap();

    let bridge = ExecutionBridge::new(HttpPool::new(None).unwrap(), &root.settings());
    let decision = bridge
        .pre_tool_use(&shell_call("make report"), &TurnCancel::never())
        .await;

    let PreToolUse::Intercepted { result, .. } = decision else {
        panic!("expected interception");
    };
    assert!(result.success);
    assert_eq!(result.synced_files, 0);
    assert!(!root.notes.join("result.md").exists());
}

#[tokio::test]
async fn test_nonzero_exit_replays_streams_and_failure() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse {
        stdout: "partial".to_string(),
        stderr: "error: missing".to_string(),
        exit_status: 127,
        ..WireResponse::default()
    }))
    .await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());

    let bridge = ExecutionBridge::new(HttpPool::new(None).unwrap(), &root.settings());
    let PreToolUse::Intercepted {
        result,
        replay_command,
    } = bridge
        .pre_tool_use(&shell_call("missing-tool"), &TurnCancel::never())
        .await
    else {
        panic!("expected interception");
    };

    assert!(!result.success);
    assert_eq!(result.exit_status, Some(127));
    assert_eq!(result.error.as_deref(), Some("command exited with status 127"));
    assert_eq!(
        replay_command,
        "printf '%s' partial; printf '%s' 'error: missing' >&2; exit 1"
    );
}

#[tokio::test]
async fn test_http_error_becomes_failed_result() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Status(502, "bad gateway".to_string())).await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());

    let bridge = ExecutionBridge::new(HttpPool::new(None).unwrap(), &root.settings());
    let PreToolUse::Intercepted {
        result,
        replay_command,
    } = bridge.pre_tool_use(&shell_call("ls"), &TurnCancel::never()).await
    else {
        panic!("expected interception");
    };

    assert!(!result.success);
    assert!(result.exit_status.is_none());
    assert_contains(result.error.as_deref().unwrap(), "HTTP 502");
    assert_eq!(replay_command, "exit 1");
}

#[tokio::test]
async fn test_disabled_boundary_never_contacts_pool() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse::default())).await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());
    root.store().set_enabled(false).unwrap();

    let bridge = ExecutionBridge::new(HttpPool::new(None).unwrap(), &root.settings())
        .with_timeout(Duration::from_secs(5));
    let decision = bridge.pre_tool_use(&shell_call("ls"), &TurnCancel::never()).await;

    assert!(!decision.is_intercepted());
    assert!(server.received().is_empty());
}
