//! Hardware Inventory (SPEC_FULL.md §4.H).
//!
//! Collects OS/CPU/RAM/GPU facts for the report's `hwinfo` field, grounded
//! in original_source/pytab/hwi.py's `get_system_info()` shape but backed
//! by the `sysinfo` crate instead of shelling out to `lshw`/`wmic`/
//! `system_profiler`.

use serde::{Deserialize, Serialize};
use sysinfo::System;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub kernel_version: String,
    pub pretty_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuInfo {
    pub product: String,
    pub vendor: String,
    pub cores: usize,
    pub hz_advertised_mhz: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RamModule {
    pub size_gb: u64,
    pub units: &'static str,
}

/// A detected display adapter. `vendor` is normalized to `cpu`/`intel`/
/// `amd`/`nvidia`/`unknown` by [`classify_vendor`], mirroring
/// original_source/pytab/hwi.py's `check_ven`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuInfo {
    pub product: String,
    pub vendor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub os: OsInfo,
    pub cpu: Vec<CpuInfo>,
    pub memory: Vec<RamModule>,
    pub gpu: Vec<GpuInfo>,
}

/// Normalizes a free-text vendor string to one of `cpu`/`intel`/`amd`/
/// `nvidia`, falling back to `unknown` — the three-way classification
/// original_source/pytab/hwi.py's `check_ven()` performs for both CPUs
/// and GPUs.
pub fn classify_vendor(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("intel") {
        "intel"
    } else if lower.contains("amd") || lower.contains("advanced micro devices") {
        "amd"
    } else if lower.contains("nvidia") {
        "nvidia"
    } else {
        "unknown"
    }
}

/// Collects the full hardware inventory for this host (SPEC_FULL.md §4.H).
/// Never fails: any unavailable field degrades to a placeholder rather
/// than aborting the benchmark run, since `hwinfo` is purely informational
/// in the report (spec.md §6).
pub fn collect() -> HardwareInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    let os = OsInfo {
        name: System::name().unwrap_or_else(|| "unknown".to_string()),
        version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
        kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        pretty_name: System::long_os_version().unwrap_or_else(|| "unknown OS".to_string()),
    };

    let cpu = collect_cpu(&sys);
    let memory = vec![RamModule {
        size_gb: sys.total_memory() / 1_073_741_824,
        units: "gigabytes",
    }];

    // sysinfo does not enumerate display adapters; without shelling out to
    // lshw/wmic/system_profiler (the behavior SPEC_FULL.md explicitly
    // replaces) a GPU list cannot be populated here. The probe engine's
    // GPU index selection does not depend on this field — it is purely
    // descriptive in the report.
    let gpu = Vec::new();

    HardwareInfo { os, cpu, memory, gpu }
}

fn collect_cpu(sys: &System) -> Vec<CpuInfo> {
    let cpus = sys.cpus();
    let Some(first) = cpus.first() else {
        return Vec::new();
    };

    vec![CpuInfo {
        product: first.brand().to_string(),
        vendor: classify_vendor(first.vendor_id()).to_string(),
        cores: cpus.len(),
        hz_advertised_mhz: first.frequency(),
    }]
}

/// The GPU index used for probing. spec.md §3: "for NVIDIA always 0"; the
/// CLI front end may override this for multi-GPU hosts via `--gpu-index`.
pub fn default_gpu_index() -> u32 {
    0
}

/// Validates a requested GPU index against the collected inventory. Skips
/// the check when the inventory couldn't enumerate any GPUs — this host's
/// adapters being unknown is not the same as the index being wrong.
pub fn validate_gpu_index(gpu_index: u32, gpus: &[GpuInfo]) -> Result<(), crate::error::HardwareError> {
    if gpus.is_empty() {
        return Ok(());
    }
    if gpu_index as usize >= gpus.len() {
        return Err(crate::error::HardwareError::GpuIndexOutOfRange {
            requested: gpu_index,
            available: gpus.len(),
        });
    }
    Ok(())
}
