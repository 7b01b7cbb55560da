//! Process Runner (spec.md §4.A).
//!
//! Launches one transcoder child with a hard wall-clock deadline, captures
//! its stderr, and classifies the outcome into an optional failure tag.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::RunnerError;
use crate::model::FailureReason;

/// Hard wall-clock deadline for a single transcoder invocation (spec.md §4.A).
pub const DEADLINE: Duration = Duration::from_secs(120);

/// Outcome of one child run: its captured stderr text and an optional
/// failure tag. `failure` is `None` iff the child exited 0.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stderr: String,
    pub failure: Option<FailureReason>,
}

/// Runs one transcoder child to completion or until `DEADLINE` elapses.
///
/// `worker_id` and `gpu_index` do not affect the spawned command (the
/// Plan Driver has already substituted `{gpu}` into `argv`) — they exist
/// purely so callers can correlate logs with a specific worker/device.
pub async fn run_worker(
    worker_id: u32,
    argv: &[String],
    gpu_index: Option<u32>,
) -> Result<RunOutcome, RunnerError> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| RunnerError::Spawn(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty argv",
        )))?;

    tracing::debug!(worker_id, gpu_index, program = %program, "spawning transcoder worker");

    let mut child = Command::new(program)
        .args(rest)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(RunnerError::Spawn)?;

    let mut stderr_pipe = child.stderr.take().ok_or(RunnerError::NoStderr)?;

    let deadline_fut = async {
        let mut buf = String::new();
        let read_result = stderr_pipe.read_to_string(&mut buf).await;
        let status = child.wait().await;
        (read_result, status, buf)
    };

    match tokio::time::timeout(DEADLINE, deadline_fut).await {
        Ok((read_result, status, stderr)) => {
            read_result.map_err(RunnerError::ReadStderr)?;
            let status = status.map_err(RunnerError::Spawn)?;

            let failure = if status.success() {
                None
            } else {
                Some(classify_failure(&stderr))
            };

            Ok(RunOutcome { stderr, failure })
        }
        Err(_) => {
            // Deadline exceeded: terminate the child and release its resources.
            let _ = child.start_kill();
            let _ = child.wait().await;
            tracing::warn!(worker_id, "transcoder worker exceeded deadline, killed");
            Ok(RunOutcome {
                stderr: String::new(),
                failure: Some(FailureReason::FailedTimeout),
            })
        }
    }
}

/// Classifies a non-zero-exit child's stderr into a failure tag (spec.md §4.A).
/// Order matters: the encoder-session-limit phrases are checked before the
/// generic device-error phrases so that, e.g., "initialization failed"
/// during an NVENC session cap is not mistaken for a device error.
fn classify_failure(stderr: &str) -> FailureReason {
    let lower = stderr.to_ascii_lowercase();

    const LIMIT_PHRASES: [&str; 4] = [
        "no free encoding sessions",
        "cannot open encoder",
        "resource temporarily unavailable",
        "initialization failed",
    ];

    if LIMIT_PHRASES.iter().any(|p| lower.contains(p)) {
        FailureReason::FailedNvencLimit
    } else if lower.contains("no such device") {
        FailureReason::DeviceNotFound
    } else if lower.contains("invalid device ordinal") {
        FailureReason::InvalidDevice
    } else if lower.is_empty() {
        FailureReason::UnknownFfmpegError
    } else {
        FailureReason::GenericFfmpegFailure
    }
}
