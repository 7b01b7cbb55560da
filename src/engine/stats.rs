//! Stat Parser (spec.md §4.B).
//!
//! Extracts per-worker frame count, speed, framerate, user time, and peak
//! RSS from a single transcoder run's captured stderr text.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::WorkerStats;

/// Progress lines below this frame count are treated as warmup and dropped.
const WARMUP_FRAME_THRESHOLD: u64 = 500;

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^frame=\s*(\d+)").unwrap())
}

fn fps_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"fps=\s*([0-9.]+)").unwrap())
}

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"speed=\s*([0-9.]+)x").unwrap())
}

fn maxrss_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^bench:.*\bmaxrss=\s*(\d+)kB").unwrap())
}

fn utime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^bench:.*\b(?:user_time|utime)=\s*([0-9.]+)s").unwrap())
}

/// Parses one worker's full captured stderr into a WorkerStats record.
///
/// Progress lines (`frame=...`) are retained only when their frame value is
/// ≥ 500 (warmup). `bench: maxrss=...kB` and `bench: ...utime=...s` lines
/// are matched independently of each other and of the progress lines; the
/// *last* matching line of each kind wins, per spec.md §4.B.
pub fn parse_stderr(stderr: &str) -> WorkerStats {
    let mut frames: Vec<u64> = Vec::new();
    let mut speeds: Vec<f64> = Vec::new();
    let mut fps_sum = 0.0;
    let mut rss_kb: u64 = 0;
    let mut time_s: f64 = 0.0;

    for raw_line in stderr.lines() {
        let line = raw_line.trim();

        if let Some(caps) = frame_re().captures(line) {
            let frame: u64 = caps[1].parse().unwrap_or(0);
            if frame >= WARMUP_FRAME_THRESHOLD {
                let speed = speed_re()
                    .captures(line)
                    .and_then(|c| c[1].parse::<f64>().ok())
                    .unwrap_or(0.0);
                let fps = fps_re()
                    .captures(line)
                    .and_then(|c| c[1].parse::<f64>().ok())
                    .unwrap_or(0.0);
                frames.push(frame);
                speeds.push(speed);
                fps_sum += fps;
            }
            continue;
        }

        if let Some(caps) = maxrss_re().captures(line) {
            rss_kb = caps[1].parse().unwrap_or(rss_kb);
            continue;
        }

        if let Some(caps) = utime_re().captures(line) {
            time_s = caps[1].parse().unwrap_or(time_s);
        }
    }

    let divisor = (frames.len().max(1)) as f64;
    let frame = frames.into_iter().max().unwrap_or(1);
    let speed = speeds.iter().sum::<f64>() / divisor;
    let fps = fps_sum / divisor;

    WorkerStats {
        frame,
        speed,
        time_s,
        rss_kb,
        fps,
    }
}
