//! Canned simulated tools for tests.

use std::time::Duration;

use toolrun::SimWorker;

/// A sim that prints the given lines and exits with `exit_code`.
pub fn scripted(
    stdout_lines: Vec<&str>,
    stderr_lines: Vec<&str>,
    exit_code: i32,
) -> SimWorker {
    let stdout_lines: Vec<String> = stdout_lines.into_iter().map(String::from).collect();
    let stderr_lines: Vec<String> = stderr_lines.into_iter().map(String::from).collect();

    SimWorker::from_fn(move |sim, _cancel| {
        let stdout_lines = stdout_lines.clone();
        let stderr_lines = stderr_lines.clone();
        async move {
            for line in &stdout_lines {
                sim.emit_stdout(line.clone()).await;
            }
            for line in &stderr_lines {
                sim.emit_stderr(line.clone()).await;
            }
            exit_code
        }
    })
}

/// A sim that sleeps for `duration` and then exits with `exit_code`.
///
/// Useful for cancellation and concurrency-cap tests.
pub fn sleeper(duration: Duration, exit_code: i32) -> SimWorker {
    SimWorker::from_fn(move |_sim, _cancel| async move {
        tokio::time::sleep(duration).await;
        exit_code
    })
}
