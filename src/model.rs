//! Wire and engine data model shared across the crate.
//!
//! Field names and casing here are a compatibility surface (spec.md §6):
//! anything serialized must match the catalog/report shape exactly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which compute device performs the transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorType {
    Cpu,
    Intel,
    Amd,
    Nvidia,
}

impl AcceleratorType {
    pub const ALL: [AcceleratorType; 4] = [
        AcceleratorType::Cpu,
        AcceleratorType::Intel,
        AcceleratorType::Amd,
        AcceleratorType::Nvidia,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AcceleratorType::Cpu => "cpu",
            AcceleratorType::Intel => "intel",
            AcceleratorType::Amd => "amd",
            AcceleratorType::Nvidia => "nvidia",
        }
    }
}

impl std::str::FromStr for AcceleratorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(AcceleratorType::Cpu),
            "intel" => Ok(AcceleratorType::Intel),
            "amd" => Ok(AcceleratorType::Amd),
            "nvidia" => Ok(AcceleratorType::Nvidia),
            other => Err(format!("unknown accelerator type: {other}")),
        }
    }
}

/// A command template for one accelerator/codec combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub accelerator: AcceleratorType,
    pub output_codec: String,
    /// May contain the literal placeholders `{video_file}` and `{gpu}`.
    pub args_template: String,
}

/// One resolution/bitrate conversion within a File, holding a template per accelerator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    pub id: String,
    pub source_resolution: String,
    pub target_resolution: String,
    pub target_bitrate_bps: u64,
    pub templates: Vec<CommandTemplate>,
}

/// One source media entry in the benchmark plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    pub path: PathBuf,
    pub conversions: Vec<Conversion>,
}

/// The ordered sequence of files this host must benchmark.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchmarkPlan {
    pub files: Vec<File>,
}

/// Which accelerators/executable/GPU this run targets.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub enabled: Vec<AcceleratorType>,
    pub transcoder_path: PathBuf,
    pub gpu_index: u32,
}

impl ExecutionContext {
    pub fn is_enabled(&self, accel: AcceleratorType) -> bool {
        self.enabled.contains(&accel)
    }
}

/// Tag describing why a probe level failed or why the engine stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    GenericFfmpegFailure,
    FailedTimeout,
    FailedNvencLimit,
    Performance,
    InfinityScaleback,
    DeviceNotFound,
    InvalidDevice,
    UnknownFfmpegError,
}

impl FailureReason {
    /// `failed_nvenc_limit`'s alias per spec.md §3 — used only when appended
    /// by the probe engine's scaleback/enumeration termination rules, never
    /// by the process runner's classification itself.
    pub const LIMITED_ALIAS: &'static str = "limited";
}

/// Per-worker measurements extracted from one transcoder run's stderr.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkerStats {
    pub frame: u64,
    pub speed: f64,
    pub time_s: f64,
    pub rss_kb: u64,
    pub fps: f64,
}

/// Per-worker-count level that succeeded: the fold over all N workers' stats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub workers: u32,
    pub frame: u64,
    pub speed: f64,
    pub time_s: f64,
    pub rss_kb: u64,
    #[serde(rename = "avgFPS")]
    pub avg_fps: f64,
}

/// The aggregated per-triple terminal summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub max_streams: u32,
    pub failure_reasons: Vec<String>,
    pub single_worker_speed: f64,
    pub single_worker_rss_kb: u64,
}

/// One (file × conversion × accelerator) triple's complete probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub accelerator: AcceleratorType,
    pub conversion_id: String,
    pub gpu_index: Option<u32>,
    pub cpu_index: Option<u32>,
    pub runs: Vec<RunStats>,
    pub summary: Summary,
}

impl ProbeResult {
    /// Builds the Summary from the recorded runs and accumulated failure tags,
    /// per spec.md §4.D.3 / §3 invariants.
    pub fn finish(
        accelerator: AcceleratorType,
        conversion_id: String,
        gpu_index: Option<u32>,
        cpu_index: Option<u32>,
        runs: Vec<RunStats>,
        failure_reasons: Vec<String>,
    ) -> Self {
        let summary = if let Some(first) = runs.first() {
            Summary {
                max_streams: runs.iter().map(|r| r.workers).max().unwrap_or(0),
                failure_reasons,
                single_worker_speed: first.speed,
                single_worker_rss_kb: first.rss_kb,
            }
        } else {
            Summary {
                max_streams: 0,
                failure_reasons,
                single_worker_speed: 0.0,
                single_worker_rss_kb: 0,
            }
        };

        Self {
            accelerator,
            conversion_id,
            gpu_index,
            cpu_index,
            runs,
            summary,
        }
    }
}
