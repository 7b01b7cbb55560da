//! Worker Pool (spec.md §4.C).
//!
//! Launches N Process Runners concurrently for a single probe level and
//! folds their outcomes into either a union of failure tags or aggregated
//! stats.

use tokio::task::JoinSet;

use crate::error::RunnerError;
use crate::model::{FailureReason, WorkerStats};

use super::process::run_worker;
use super::stats::parse_stderr;

/// Aggregated stats for one successful probe level (spec.md §4.C fold).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedStats {
    pub workers: u32,
    pub frame: u64,
    pub speed: f64,
    pub time_s: f64,
    pub rss_kb: u64,
    pub avg_fps: f64,
}

/// Outcome of one probe level: either a union of failure tags, or the
/// aggregated stats across all N workers.
#[derive(Debug, Clone)]
pub enum PoolOutcome {
    Failed(Vec<FailureReason>),
    Succeeded(AggregatedStats),
}

/// Runs `worker_count` transcoder workers concurrently against `argv` and
/// waits for all of them to finish — a failing peer never cancels the
/// others, since their failure tags are informative (spec.md §4.C).
pub async fn run_pool(
    worker_count: u32,
    argv: &[String],
    gpu_index: Option<u32>,
) -> Result<PoolOutcome, RunnerError> {
    let mut set: JoinSet<Result<super::process::RunOutcome, RunnerError>> = JoinSet::new();

    for worker_id in 0..worker_count {
        let argv = argv.to_vec();
        set.spawn(async move { run_worker(worker_id, &argv, gpu_index).await });
    }

    let mut outcomes = Vec::with_capacity(worker_count as usize);
    while let Some(joined) = set.join_next().await {
        // A panicking worker task surfaces as a spawn-style error; real
        // transcoder crashes are already captured as `failure` tags.
        let outcome = joined.map_err(|e| {
            RunnerError::Spawn(std::io::Error::new(std::io::ErrorKind::Other, e))
        })??;
        outcomes.push(outcome);
    }

    let failures: Vec<FailureReason> = outcomes.iter().filter_map(|o| o.failure).collect();
    if !failures.is_empty() {
        return Ok(PoolOutcome::Failed(failures));
    }

    let worker_stats: Vec<WorkerStats> = outcomes.iter().map(|o| parse_stderr(&o.stderr)).collect();
    Ok(PoolOutcome::Succeeded(fold(worker_stats)))
}

fn fold(stats: Vec<WorkerStats>) -> AggregatedStats {
    let workers = stats.len() as u32;
    let n = stats.len().max(1) as f64;

    let frame = stats.iter().map(|s| s.frame).max().unwrap_or(0);
    let rss_kb = stats.iter().map(|s| s.rss_kb).max().unwrap_or(0);
    let speed = stats.iter().map(|s| s.speed).sum::<f64>() / n;
    let time_s = stats.iter().map(|s| s.time_s).sum::<f64>() / n;
    let avg_fps = stats.iter().map(|s| s.fps).sum::<f64>() / n;

    AggregatedStats {
        workers,
        frame,
        speed,
        time_s,
        rss_kb,
        avg_fps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_averages_speed_time_fps_and_maxes_frame_rss() {
        let stats = vec![
            WorkerStats { frame: 1000, speed: 2.0, time_s: 10.0, rss_kb: 500, fps: 30.0 },
            WorkerStats { frame: 1200, speed: 1.0, time_s: 20.0, rss_kb: 700, fps: 20.0 },
        ];
        let agg = fold(stats);
        assert_eq!(agg.workers, 2);
        assert_eq!(agg.frame, 1200);
        assert_eq!(agg.rss_kb, 700);
        assert!((agg.speed - 1.5).abs() < 1e-9);
        assert!((agg.time_s - 15.0).abs() < 1e-9);
        assert!((agg.avg_fps - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pool_succeeds_when_all_workers_exit_zero() {
        let argv = vec!["true".to_string()];
        let outcome = run_pool(3, &argv, None).await.unwrap();
        match outcome {
            PoolOutcome::Succeeded(agg) => assert_eq!(agg.workers, 3),
            PoolOutcome::Failed(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn pool_unions_failure_tags_without_cancelling_peers() {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'no such device' 1>&2; exit 1".to_string(),
        ];
        let outcome = run_pool(3, &argv, None).await.unwrap();
        match outcome {
            PoolOutcome::Failed(tags) => {
                assert_eq!(tags.len(), 3);
                assert!(tags.iter().all(|t| *t == FailureReason::DeviceNotFound));
            }
            PoolOutcome::Succeeded(_) => panic!("expected failure"),
        }
    }
}
