//! CLI front end (SPEC_FULL.md §4.J).
//!
//! Orchestrates the Catalog Client, Stager, Hardware Inventory, and Plan
//! Driver in sequence, then hands the collected ProbeResults to the
//! Report Writer. On any collaborator error this exits non-zero, per
//! spec.md §6 "Exit behavior (collaborator)": catalog unreachable,
//! unsupported host platform, or a hardware-selection error are all
//! preconditions to the engine, not the engine's own failures.

mod catalog;
mod engine;
mod error;
mod hardware;
mod model;
mod report;
mod stage;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use model::{AcceleratorType, BenchmarkPlan, ExecutionContext};
use report::Report;

/// Transcoding-capacity benchmarking client.
#[derive(Parser, Debug)]
#[command(name = "transcode-bench", version, about)]
struct Cli {
    /// Base URL of the benchmark catalog (plan fetch + result submission).
    #[arg(long, env = "TRANSCODE_BENCH_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Read the BenchmarkPlan from a local JSON file instead of the
    /// catalog — for testing or air-gapped hosts.
    #[arg(long)]
    offline_plan: Option<PathBuf>,

    /// Platform id to request from the catalog (required unless
    /// --offline-plan is given).
    #[arg(long, env = "TRANSCODE_BENCH_PLATFORM_ID")]
    platform_id: Option<String>,

    /// Directory assets are staged into.
    #[arg(long, env = "TRANSCODE_BENCH_STAGING_DIR", default_value = "./staging")]
    staging_dir: PathBuf,

    /// Path to an already-staged transcoder executable. When omitted, the
    /// Stager downloads one from --executable-url and verifies it against
    /// --executable-sha256.
    #[arg(long, env = "TRANSCODE_BENCH_TRANSCODER")]
    transcoder: Option<PathBuf>,

    /// Remote URL of the transcoder executable (or a .zip containing it).
    #[arg(long)]
    executable_url: Option<String>,

    /// Expected SHA-256 hex digest of the staged transcoder executable.
    #[arg(long)]
    executable_sha256: Option<String>,

    /// Accelerator types to probe.
    #[arg(long, value_delimiter = ',', default_value = "cpu")]
    accelerators: Vec<AcceleratorType>,

    /// GPU index to pass as `{gpu}` in command templates.
    #[arg(long, default_value_t = hardware::default_gpu_index())]
    gpu_index: u32,

    /// Where to write the JSON report. Prints to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip POSTing the finished report back to the catalog.
    #[arg(long)]
    no_submit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "benchmark run failed");
            Err(err)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = reqwest::Client::new();

    let (mut plan, token) = load_plan(&client, &cli).await?;

    tracing::info!(files = plan.files.len(), "benchmark plan loaded");

    let hwinfo = hardware::collect();
    hardware::validate_gpu_index(cli.gpu_index, &hwinfo.gpu).context("GPU selection failed")?;

    let transcoder_path = stage_transcoder(&client, &cli).await?;
    resolve_media_paths(&mut plan, &cli.staging_dir);

    let ctx = ExecutionContext {
        enabled: cli.accelerators.clone(),
        transcoder_path,
        gpu_index: cli.gpu_index,
    };

    let tests = engine::driver::run_plan(&plan, &ctx)
        .await
        .context("benchmark engine failed")?;

    tracing::info!(results = tests.len(), "benchmark plan complete");

    let report = Report { token, hwinfo, tests };
    report::write_report(cli.output.as_deref(), &report)?;

    if !cli.no_submit {
        if let Some(base_url) = cli.catalog_url.as_deref() {
            catalog::submit_report(&client, base_url, &report).await;
        }
    }

    Ok(())
}

/// Loads a BenchmarkPlan either from `--offline-plan` or from the catalog
/// (spec.md §4.F "Input: a BenchmarkPlan ... Output: ... plus an opaque
/// token echoed from the catalog").
async fn load_plan(client: &reqwest::Client, cli: &Cli) -> Result<(BenchmarkPlan, String)> {
    if let Some(path) = &cli.offline_plan {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading offline plan {}", path.display()))?;
        let plan: BenchmarkPlan = serde_json::from_str(&contents)
            .with_context(|| format!("parsing offline plan {}", path.display()))?;
        return Ok((plan, "offline".to_string()));
    }

    let base_url = cli
        .catalog_url
        .as_deref()
        .context("--catalog-url is required unless --offline-plan is given")?;
    let platform_id = cli
        .platform_id
        .as_deref()
        .context("--platform-id is required unless --offline-plan is given")?;

    let (plan, token) = catalog::fetch_plan(client, base_url, platform_id)
        .await
        .context("fetching benchmark plan from catalog")?;
    Ok((plan, token))
}

/// Stages the transcoder executable, either by trusting an
/// already-provided `--transcoder` path or by downloading and verifying
/// `--executable-url`/`--executable-sha256` into the staging directory.
async fn stage_transcoder(client: &reqwest::Client, cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.transcoder {
        return Ok(path.clone());
    }

    let url = cli
        .executable_url
        .as_deref()
        .context("--transcoder or --executable-url is required")?;
    let sha256 = cli
        .executable_sha256
        .as_deref()
        .context("--executable-sha256 is required when staging via --executable-url")?;

    let manifest = stage::stage(
        client,
        &BenchmarkPlan::default(),
        &cli.staging_dir,
        &stage::RemoteAsset { url: url.to_string(), sha256: sha256.to_string() },
        &[],
    )
    .await
    .context("staging transcoder executable")?;

    Ok(manifest.executable)
}

/// Rewrites each File's path to its staged location when it names a bare
/// filename rather than an already-resolved path, mirroring the Stager's
/// "rewrites each File's path to its staged location" contract
/// (SPEC_FULL.md §4.I) for plans whose media is pre-populated in
/// `staging_dir` rather than fetched per-file over HTTP.
fn resolve_media_paths(plan: &mut BenchmarkPlan, staging_dir: &std::path::Path) {
    for file in &mut plan.files {
        if file.path.is_absolute() || file.path.exists() {
            continue;
        }
        file.path = staging_dir.join(&file.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_media_paths_joins_relative_names_under_staging_dir() {
        let mut plan = BenchmarkPlan {
            files: vec![model::File {
                name: "clip".into(),
                path: PathBuf::from("clip.mkv"),
                conversions: Vec::new(),
            }],
        };
        resolve_media_paths(&mut plan, std::path::Path::new("/staging"));
        assert_eq!(plan.files[0].path, PathBuf::from("/staging/clip.mkv"));
    }

    #[test]
    fn resolve_media_paths_leaves_absolute_paths_alone() {
        let mut plan = BenchmarkPlan {
            files: vec![model::File {
                name: "clip".into(),
                path: PathBuf::from("/already/staged/clip.mkv"),
                conversions: Vec::new(),
            }],
        };
        resolve_media_paths(&mut plan, std::path::Path::new("/staging"));
        assert_eq!(plan.files[0].path, PathBuf::from("/already/staged/clip.mkv"));
    }
}
