//! Plan Driver (spec.md §4.E).
//!
//! Iterates a BenchmarkPlan's files × conversions × command-templates in
//! declaration order, skips accelerator types the ExecutionContext hasn't
//! enabled, substitutes `{video_file}`/`{gpu}` into the argument template,
//! and invokes the Probe Engine once per surviving template. Only
//! ProbeResults with at least one recorded run are emitted (spec.md §4.E).

use crate::error::RunnerError;
use crate::model::{BenchmarkPlan, ExecutionContext, ProbeResult};

use super::probe::probe;

/// Runs the full plan against `ctx` and returns the ordered, filtered
/// sequence of ProbeResults (spec.md §4.E, §4.F).
pub async fn run_plan(
    plan: &BenchmarkPlan,
    ctx: &ExecutionContext,
) -> Result<Vec<ProbeResult>, RunnerError> {
    let mut results = Vec::new();

    for file in &plan.files {
        for conversion in &file.conversions {
            for template in &conversion.templates {
                if !ctx.is_enabled(template.accelerator) {
                    tracing::debug!(
                        accelerator = template.accelerator.as_str(),
                        conversion = %conversion.id,
                        "skipping disabled accelerator"
                    );
                    continue;
                }

                let argv = build_argv(&ctx.transcoder_path, &template.args_template, file, ctx.gpu_index);

                tracing::info!(
                    file = %file.name,
                    conversion = %conversion.id,
                    accelerator = template.accelerator.as_str(),
                    "starting probe"
                );

                let result = probe(
                    template.accelerator,
                    conversion.id.clone(),
                    &argv,
                    ctx.gpu_index,
                )
                .await?;

                if result.runs.is_empty() {
                    tracing::warn!(
                        conversion = %conversion.id,
                        accelerator = template.accelerator.as_str(),
                        failures = ?result.summary.failure_reasons,
                        "probe produced no usable runs, discarding"
                    );
                    continue;
                }

                results.push(result);
            }
        }
    }

    Ok(results)
}

/// Substitutes the literal `{video_file}`/`{gpu}` placeholders, prepends
/// the transcoder executable path, and splits on runs of ASCII whitespace
/// to form the argv (spec.md §4.E, §6 "Command template substitution").
fn build_argv(
    transcoder_path: &std::path::Path,
    template: &str,
    file: &crate::model::File,
    gpu_index: u32,
) -> Vec<String> {
    let substituted = template
        .replace("{video_file}", &file.path.display().to_string())
        .replace("{gpu}", &gpu_index.to_string());

    let mut argv = vec![transcoder_path.display().to_string()];
    argv.extend(substituted.split_ascii_whitespace().map(str::to_string));
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AcceleratorType, CommandTemplate, Conversion, File};
    use std::path::PathBuf;

    #[test]
    fn substitution_is_literal_and_whitespace_split() {
        let file = File {
            name: "clip".into(),
            path: PathBuf::from("/media/clip.mkv"),
            conversions: Vec::new(),
        };
        let argv = build_argv(
            std::path::Path::new("/usr/bin/ffmpeg"),
            "-hwaccel cuda -gpu {gpu} -i {video_file} -f null -",
            &file,
            2,
        );
        assert_eq!(
            argv,
            vec![
                "/usr/bin/ffmpeg",
                "-hwaccel",
                "cuda",
                "-gpu",
                "2",
                "-i",
                "/media/clip.mkv",
                "-f",
                "null",
                "-",
            ]
        );
    }

    #[test]
    fn disabled_accelerator_templates_are_never_probed() {
        // Construction-only smoke test: a plan whose sole template is an
        // accelerator not present in ExecutionContext.enabled must not
        // appear in argv-building paths. run_plan itself requires a real
        // transcoder binary, so the enablement filter is covered here via
        // the same is_enabled() call it uses internally.
        let ctx = ExecutionContext {
            enabled: vec![AcceleratorType::Cpu],
            transcoder_path: PathBuf::from("/usr/bin/ffmpeg"),
            gpu_index: 0,
        };
        let template = CommandTemplate {
            accelerator: AcceleratorType::Nvidia,
            output_codec: "hevc_nvenc".into(),
            args_template: "-i {video_file} -f null -".into(),
        };
        let _conversion = Conversion {
            id: "c1".into(),
            source_resolution: "1080p".into(),
            target_resolution: "720p".into(),
            target_bitrate_bps: 2_000_000,
            templates: vec![template.clone()],
        };
        assert!(!ctx.is_enabled(template.accelerator));
    }
}
