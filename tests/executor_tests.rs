//! Native executor against real processes

use reconkit::exec::{CommandSpec, Executor, NativeExecutor};
use reconkit::ExecError;
use std::time::{Duration, Instant};

const MIB: usize = 1024 * 1024;

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn test_streams_are_captured_separately() {
    let executor = NativeExecutor::new(MIB);

    let result = executor
        .run(&sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.timed_out);
    assert!(!result.success());
    assert_eq!(result.stdout_lossy(), "out\n");
    assert_eq!(result.stderr_lossy(), "err\n");
}

#[tokio::test]
async fn test_arguments_are_not_shell_interpreted() {
    let executor = NativeExecutor::new(MIB);
    let spec = CommandSpec::new("echo", vec!["$(id); rm -rf /".to_string()]);

    let result = executor.run(&spec, Duration::from_secs(10)).await.unwrap();

    assert!(result.success());
    assert_eq!(result.stdout_lossy(), "$(id); rm -rf /\n");
}

#[tokio::test]
async fn test_timeout_kills_and_keeps_partial_output() {
    let executor = NativeExecutor::new(MIB);
    let start = Instant::now();

    let result = executor
        .run(&sh("echo started; sleep 30; echo never"), Duration::from_millis(500))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.exit_code, -1);
    assert_eq!(result.stdout_lossy(), "started\n");
    assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
}

#[tokio::test]
async fn test_timeout_does_not_wait_for_grandchildren() {
    let executor = NativeExecutor::new(MIB).with_drain_grace(Duration::from_millis(200));
    let start = Instant::now();

    // the background sleep inherits stdout and would hold the pipe open
    let result = executor
        .run(&sh("sleep 30 & sleep 30"), Duration::from_millis(300))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert!(start.elapsed() < Duration::from_secs(5), "took {:?}", start.elapsed());
}

#[tokio::test]
async fn test_missing_binary_is_not_a_result() {
    let executor = NativeExecutor::new(MIB);
    let spec = CommandSpec::new("reconkit-no-such-binary", vec![]);

    let err = executor.run(&spec, Duration::from_secs(5)).await.unwrap_err();

    match err {
        ExecError::BinaryNotFound { program } => assert_eq!(program, "reconkit-no-such-binary"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_output_is_capped_per_stream() {
    let executor = NativeExecutor::new(1024);

    let result = executor
        .run(&sh("head -c 100000 /dev/zero"), Duration::from_secs(10))
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.stdout.len(), 1024);
    assert!(result.output_truncated);
}
