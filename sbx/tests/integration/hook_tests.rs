use std::process::Stdio;

use sbx_common::protocol::WireResponse;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::common::{MockPoolServer, PoolBehavior, TestDataRoot, init_test_logging};

struct HookRun {
    success: bool,
    stdout: String,
}

async fn run_hook(root: &TestDataRoot, input: &str) -> HookRun {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sbx"))
        .arg("hook")
        .env("SBX_DATA_DIR", root.path())
        .env_remove("SBX_CONFIG_PATH")
        .env_remove("SBX_POOL_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start sbx hook");

    {
        let mut stdin = child.stdin.take().expect("Failed to open stdin");
        stdin
            .write_all(input.as_bytes())
            .await
            .expect("Failed to write hook input");
    }

    let output = child.wait_with_output().await.expect("Failed to read hook output");
    HookRun {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    }
}

#[tokio::test]
async fn test_hook_allows_non_shell_tool() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_allows_non_shell_tool");

    let root = TestDataRoot::new();
    root.enable("http://127.0.0.1:9");
    let run = run_hook(&root, r#"{"tool_name":"read_file","tool_input":{"path":"notes"}}"#).await;

    assert!(run.success, "Hook exited with failure");
    assert!(run.stdout.trim().is_empty(), "Expected empty output, got: {}", run.stdout);

    crate::test_log!("TEST PASS: test_hook_allows_non_shell_tool");
}

#[tokio::test]
async fn test_hook_allows_shell_tool_when_disabled() {
    init_test_logging();
    let root = TestDataRoot::new();
    let run = run_hook(&root, r#"{"tool_name":"bash","tool_input":{"command":"ls"}}"#).await;

    assert!(run.success);
    assert!(run.stdout.trim().is_empty(), "Expected empty output, got: {}", run.stdout);
}

#[tokio::test]
async fn test_hook_fails_open_on_malformed_input() {
    init_test_logging();
    let root = TestDataRoot::new();
    root.enable("http://127.0.0.1:9");

    for input in ["", "not json", r#"{"tool_input": {}}"#] {
        let run = run_hook(&root, input).await;
        assert!(run.success, "Hook failed for {input:?}");
        assert!(run.stdout.trim().is_empty(), "Output for {input:?}: {}", run.stdout);
    }
}

#[tokio::test]
async fn test_hook_replaces_shell_command_with_replay() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_replaces_shell_command_with_replay");

    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse {
        stdout: "remote-host".to_string(),
        exit_status: 0,
        ..WireResponse::default()
    }))
    .await;
    let root = TestDataRoot::new();
    root.enable(&server.endpoint());

    let run = run_hook(
        &root,
        r#"{"tool_name":"run_in_terminal","tool_input":{"command":"hostname"},"hook_event_name":"PreToolUse"}"#,
    )
    .await;

    assert!(run.success);
    let output: Value = serde_json::from_str(run.stdout.trim()).expect("hook output is JSON");
    let specific = &output["hookSpecificOutput"];
    assert_eq!(specific["permissionDecision"], "allow");
    assert_eq!(specific["updatedInput"]["command"], "printf '%s' remote-host");
    assert_eq!(server.received().len(), 1);

    crate::test_log!("TEST PASS: test_hook_replaces_shell_command_with_replay");
}

#[tokio::test]
async fn test_hook_unreachable_pool_replays_failure() {
    init_test_logging();
    let server = MockPoolServer::start(PoolBehavior::Respond(WireResponse::default())).await;
    let endpoint = server.endpoint();
    drop(server);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let root = TestDataRoot::new();
    root.enable(&endpoint);
    let run = run_hook(&root, r#"{"tool_name":"bash","tool_input":"{\"cmd\":\"ls\"}"}"#).await;

    assert!(run.success, "Hook must exit 0 even when the pool is down");
    let output: Value = serde_json::from_str(run.stdout.trim()).expect("hook output is JSON");
    assert_eq!(output["hookSpecificOutput"]["updatedInput"]["cmd"], "exit 1");
    assert!(output["hookSpecificOutput"]["updatedInput"].get("command").is_none());
}
