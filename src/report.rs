//! Report Writer (SPEC_FULL.md §4.K).
//!
//! Serializes the ordered ProbeResult sequence plus the echoed catalog
//! token and collected hardware inventory into the §6 report shape:
//! `{token, hwinfo, tests}`. Field names/types match spec.md §6 exactly.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::hardware::HardwareInfo;
use crate::model::ProbeResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub token: String,
    pub hwinfo: HardwareInfo,
    pub tests: Vec<ProbeResult>,
}

/// Pretty-prints `report` to stdout when `path` is `None`, otherwise
/// writes it as a file.
pub fn write_report(path: Option<&Path>, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), "wrote report");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{CpuInfo, OsInfo};
    use crate::model::Summary;

    fn sample_report() -> Report {
        Report {
            token: "tok-123".into(),
            hwinfo: HardwareInfo {
                os: OsInfo {
                    name: "Linux".into(),
                    version: "6.1.0".into(),
                    kernel_version: "6.1.0".into(),
                    pretty_name: "Linux 6.1.0".into(),
                },
                cpu: vec![CpuInfo {
                    product: "Generic CPU".into(),
                    vendor: "unknown".into(),
                    cores: 8,
                    hz_advertised_mhz: 3200,
                }],
                memory: Vec::new(),
                gpu: Vec::new(),
            },
            tests: vec![ProbeResult {
                accelerator: crate::model::AcceleratorType::Cpu,
                conversion_id: "c1".into(),
                gpu_index: None,
                cpu_index: Some(0),
                runs: Vec::new(),
                summary: Summary {
                    max_streams: 0,
                    failure_reasons: vec!["generic_ffmpeg_failure".into()],
                    single_worker_speed: 0.0,
                    single_worker_rss_kb: 0,
                },
            }],
        }
    }

    #[test]
    fn write_report_to_stdout_does_not_error() {
        write_report(None, &sample_report()).unwrap();
    }

    #[test]
    fn write_report_to_file_round_trips() {
        let dir = std::env::temp_dir().join(format!("report-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.json");

        write_report(Some(&path), &sample_report()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Report = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.token, "tok-123");
        assert_eq!(parsed.tests.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
