#![cfg(unix)]

use std::time::Duration;

use toolrun::{ExecutionRequest, ExecutionStatus, ManagedProcess, ToolError};
use toolrun_test_utils::{init_tracing, with_timeout};

fn shell(script: &str) -> ExecutionRequest {
    ExecutionRequest::new("/bin/sh").args(["-c", script])
}

#[tokio::test]
async fn real_process_output_is_captured_per_stream() {
    init_tracing();

    let process =
        ManagedProcess::new(shell("echo out1; echo err1 >&2; echo out2")).unwrap();
    let code = with_timeout(process.execute()).await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(process.status(), ExecutionStatus::CompletedNormally);
    assert_eq!(process.stdout_lines(), vec!["out1", "out2"]);
    assert_eq!(process.stderr_lines(), vec!["err1"]);
}

#[tokio::test]
async fn real_process_exit_code_is_reported() {
    init_tracing();

    let code = with_timeout(ManagedProcess::run(shell("exit 3"))).await.unwrap();
    assert_eq!(code, 3);
}

#[tokio::test]
async fn terminating_a_real_process_kills_it() {
    init_tracing();

    let process = ManagedProcess::new(shell("sleep 30")).unwrap();
    let running = {
        let process = process.clone();
        tokio::spawn(async move { process.execute().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    process.terminate();
    let code = with_timeout(running).await.unwrap().unwrap();

    // Killed by signal: no exit code to report.
    assert_eq!(code, -1);
    assert_eq!(process.status(), ExecutionStatus::Terminated);
}

#[tokio::test]
async fn spawning_a_missing_binary_fails() {
    init_tracing();

    let process =
        ManagedProcess::new(ExecutionRequest::new("/nonexistent/tool-xyz")).unwrap();
    let result = process.execute().await;
    assert!(matches!(result, Err(ToolError::Other(_))));

    // The process never ran, and must not claim to still be running.
    assert_eq!(process.status(), ExecutionStatus::Pending);
    assert!(matches!(
        process.exit_code(),
        Err(ToolError::NotYetComplete)
    ));
}

#[tokio::test]
async fn working_directory_is_honoured() {
    init_tracing();

    let dir = tempfile::TempDir::new().unwrap();
    let process = ManagedProcess::new(shell("pwd").current_dir(dir.path())).unwrap();

    with_timeout(process.execute()).await.unwrap();

    let reported = process.stdout_lines().pop().unwrap();
    // Compare canonicalized paths; the temp dir may sit behind a symlink.
    assert_eq!(
        std::fs::canonicalize(&reported).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
}
