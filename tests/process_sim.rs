use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use toolrun::{
    ExecutionRequest, ExecutionStatus, ManagedProcess, ProcessObserver, SimWorker, ToolError,
};
use toolrun_test_utils::sims::{scripted, sleeper};
use toolrun_test_utils::{init_tracing, with_timeout};

fn request() -> ExecutionRequest {
    ExecutionRequest::new("fake-tool").arg("--verbose")
}

#[tokio::test]
async fn captures_output_and_exit_code() {
    init_tracing();

    let sim = scripted(vec!["one", "two"], vec!["warning"], 7);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    assert_eq!(process.status(), ExecutionStatus::Pending);
    assert!(matches!(
        process.exit_code(),
        Err(ToolError::NotYetComplete)
    ));

    let code = with_timeout(process.execute()).await.unwrap();
    assert_eq!(code, 7);
    assert_eq!(process.exit_code().unwrap(), 7);
    assert_eq!(process.status(), ExecutionStatus::CompletedNormally);
    assert_eq!(process.stdout_lines(), vec!["one", "two"]);
    assert_eq!(process.stderr_lines(), vec!["warning"]);
}

#[tokio::test]
async fn second_execution_is_rejected() {
    init_tracing();

    let sim = scripted(vec![], vec![], 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    with_timeout(process.execute()).await.unwrap();

    let again = process.execute().await;
    assert!(matches!(again, Err(ToolError::AlreadyExecuted)));
    // The first run's results are untouched.
    assert_eq!(process.exit_code().unwrap(), 0);
}

#[tokio::test]
async fn empty_command_is_rejected() {
    init_tracing();

    let result = ManagedProcess::simulated(ExecutionRequest::new(""), scripted(vec![], vec![], 0));
    assert!(matches!(result, Err(ToolError::InvalidRequest(_))));
}

#[tokio::test]
async fn terminate_before_execute_is_sticky() {
    init_tracing();

    let runs = Arc::new(AtomicUsize::new(0));
    let sim = {
        let runs = Arc::clone(&runs);
        SimWorker::from_fn(move |_sim, _cancel| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                0
            }
        })
    };
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    process.terminate();
    let code = with_timeout(process.execute()).await.unwrap();

    assert_eq!(code, -1);
    assert_eq!(process.status(), ExecutionStatus::Terminated);
    assert_eq!(runs.load(Ordering::SeqCst), 0, "worker must never start");
}

#[tokio::test]
async fn terminate_during_execution_yields_minus_one() {
    init_tracing();

    let sim = sleeper(Duration::from_secs(30), 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let running = {
        let process = process.clone();
        tokio::spawn(async move { process.execute().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    process.terminate();
    let code = with_timeout(running).await.unwrap().unwrap();

    assert_eq!(code, -1);
    assert_eq!(process.status(), ExecutionStatus::Terminated);
}

#[tokio::test]
async fn cancellation_surfaces_as_error_when_requested() {
    init_tracing();

    let sim = sleeper(Duration::from_secs(30), 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();
    let cancel = CancellationToken::new();

    let running = {
        let process = process.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { process.execute_cancellable(cancel, true).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    cancel.cancel();
    let result = with_timeout(running).await.unwrap();

    assert!(matches!(result, Err(ToolError::Cancelled)));
    assert_eq!(process.status(), ExecutionStatus::Cancelled);
    assert_eq!(process.exit_code().unwrap(), -1);
}

#[tokio::test]
async fn cancellation_can_complete_normally_with_minus_one() {
    init_tracing();

    let sim = sleeper(Duration::from_secs(30), 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();
    let cancel = CancellationToken::new();

    let running = {
        let process = process.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { process.execute_cancellable(cancel, false).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    cancel.cancel();
    let code = with_timeout(running).await.unwrap().unwrap();

    assert_eq!(code, -1);
    assert_eq!(process.status(), ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn pre_cancelled_token_never_starts_the_worker() {
    init_tracing();

    let runs = Arc::new(AtomicUsize::new(0));
    let sim = {
        let runs = Arc::clone(&runs);
        SimWorker::from_fn(move |_sim, _cancel| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                0
            }
        })
    };
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = with_timeout(process.execute_cancellable(cancel, true)).await;
    assert!(matches!(result, Err(ToolError::Cancelled)));
    assert_eq!(process.status(), ExecutionStatus::Cancelled);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ProcessObserver for RecordingObserver {
    fn on_stdout_line(&self, line: &str) {
        self.events.lock().unwrap().push(format!("out:{line}"));
    }

    fn on_stderr_line(&self, line: &str) {
        self.events.lock().unwrap().push(format!("err:{line}"));
    }

    fn on_exited(&self, exit_code: i32) {
        self.events.lock().unwrap().push(format!("exit:{exit_code}"));
    }
}

#[tokio::test]
async fn observer_sees_lines_then_exit() {
    init_tracing();

    let sim = scripted(vec!["a"], vec!["b"], 3);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let observer = Arc::new(RecordingObserver {
        events: Mutex::new(Vec::new()),
    });
    process.set_observer(Arc::clone(&observer) as Arc<dyn ProcessObserver>);

    with_timeout(process.execute()).await.unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(events, vec!["out:a", "err:b", "exit:3"]);
}

struct PanickingObserver {
    calls: AtomicUsize,
}

impl ProcessObserver for PanickingObserver {
    fn on_stdout_line(&self, _line: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("observer blew up");
    }
}

#[tokio::test]
async fn panicking_observer_is_disabled_but_capture_continues() {
    init_tracing();

    let sim = scripted(vec!["first", "second", "third"], vec![], 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let observer = Arc::new(PanickingObserver {
        calls: AtomicUsize::new(0),
    });
    process.set_observer(Arc::clone(&observer) as Arc<dyn ProcessObserver>);

    with_timeout(process.execute()).await.unwrap();

    // Only the first callback ran; capture was unaffected.
    assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(process.stdout_lines(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn high_volume_interleaved_output_is_fully_captured() {
    init_tracing();

    const LINES: usize = 50_000;

    let sim = SimWorker::from_fn(|sim, _cancel| async move {
        for i in 0..LINES {
            sim.emit_stdout(format!("out {i}")).await;
            sim.emit_stderr(format!("err {i}")).await;
        }
        0
    });
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let code = with_timeout(process.execute()).await.unwrap();
    assert_eq!(code, 0);

    let stdout = process.stdout_lines();
    let stderr = process.stderr_lines();
    assert_eq!(stdout.len(), LINES);
    assert_eq!(stderr.len(), LINES);
    // Per-stream order is preserved end to end.
    for (i, line) in stdout.iter().enumerate() {
        assert_eq!(line, &format!("out {i}"));
    }
    for (i, line) in stderr.iter().enumerate() {
        assert_eq!(line, &format!("err {i}"));
    }
}

#[test]
fn execute_blocking_runs_without_a_runtime() {
    init_tracing();

    let sim = scripted(vec!["hello"], vec![], 0);
    let process = ManagedProcess::simulated(request(), sim).unwrap();

    let code = process.execute_blocking().unwrap();
    assert_eq!(code, 0);
    assert_eq!(process.stdout_lines(), vec!["hello"]);
}

#[tokio::test]
async fn sim_handle_exposes_the_request() {
    init_tracing();

    let sim = SimWorker::from_fn(|sim, _cancel| async move {
        sim.emit_stdout(format!("cmd={}", sim.command())).await;
        sim.emit_stdout(format!("args={}", sim.arguments().join(","))).await;
        0
    });
    let process = ManagedProcess::simulated(
        ExecutionRequest::new("git").args(["status", "--short"]),
        sim,
    )
    .unwrap();

    with_timeout(process.execute()).await.unwrap();
    assert_eq!(
        process.stdout_lines(),
        vec!["cmd=git", "args=status,--short"]
    );
}
