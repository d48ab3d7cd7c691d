//! Black-box benchmarking of external programs.
//!
//! A sweep compiles each target, runs it once per repetition for every
//! configuration, samples its resource usage while it runs and folds the
//! per-run measurements into aggregate statistics.
//!
//! ## Measurement model
//! - One child process at a time
//! - Wall clock from spawn to exit, CPU time from `RUSAGE_CHILDREN`
//! - CPU%, memory and thread count from a background sampler thread

use serde::{Deserialize, Serialize};

pub mod compiler;
pub mod report;
pub mod runner;
pub mod rusage;
pub mod sampler;
pub mod scenario;
pub mod stats;
pub mod sweep;

pub use compiler::{compile, CompiledProgram, Toolchain};
pub use report::{
    BenchmarkReport, ConfigurationStats, Highlight, Metric, MetricComparison, MetricStats,
    ProgramFailure, ProgramReport, ProgramValue, Ranking, SweepSummary, REPORT_SCHEMA_VERSION,
};
pub use runner::{BenchmarkRunner, LaunchMode, RunResult, RunnerOptions};
pub use sampler::{CancellationToken, ResourceSample, ResourceSampler, DEFAULT_SAMPLE_INTERVAL};
pub use scenario::{default_configurations, parse_values, Parameter, RunConfiguration};
pub use stats::{compute_stats, AggregateStatistics};
pub use sweep::{
    discover_programs, program_name, run_sweep, CompilePolicy, SweepParams, DEFAULT_REPETITIONS,
    DEFAULT_SOURCE_EXTENSION,
};

/// Severity levels for bench warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
}

/// A benchmark warning with a stable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchWarning {
    /// Stable warning code (e.g., `RUN_FAILED`).
    pub code: String,
    pub severity: Severity,
    pub message: String,
}

impl BenchWarning {
    #[must_use]
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: Severity::Warn,
            message: message.into(),
        }
    }
}

/// Warning codes for bench.
pub mod codes {
    pub const LOW_REPETITIONS: &str = "LOW_REPETITIONS";
    pub const COMPILE_FAILED: &str = "COMPILE_FAILED";
    pub const RUN_FAILED: &str = "RUN_FAILED";
    pub const NO_SUCCESSFUL_RUNS: &str = "NO_SUCCESSFUL_RUNS";
    pub const NONZERO_EXIT: &str = "NONZERO_EXIT";
}

/// Host description stored in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// CPU description (e.g., "AMD EPYC 7B13").
    pub cpu: String,
    pub os: String,
    pub arch: String,
    /// Logical cores.
    pub cores: u32,
}

impl MachineInfo {
    /// Detect machine info from the current system.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            cpu: detect_cpu_name(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cores: Self::detect_cores(),
        }
    }

    /// Logical core count, at least 1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn detect_cores() -> u32 {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1) as u32
    }
}

fn detect_cpu_name() -> String {
    #[cfg(target_os = "macos")]
    {
        if let Ok(output) = std::process::Command::new("sysctl")
            .args(["-n", "machdep.cpu.brand_string"])
            .output()
        {
            if output.status.success() {
                return String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/cpuinfo") {
            if let Some(name) = parse_cpu_model(&content) {
                return name;
            }
        }
    }

    format!("{} {}", std::env::consts::ARCH, std::env::consts::OS)
}

/// First `model name` entry of `/proc/cpuinfo`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name"))
        .find_map(|line| line.split(':').nth(1))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_constructors() {
        let w = BenchWarning::warn(codes::RUN_FAILED, "boom");
        assert_eq!(w.code, "RUN_FAILED");
        assert_eq!(w.severity, Severity::Warn);

        let i = BenchWarning::info(codes::LOW_REPETITIONS, "few");
        assert_eq!(i.severity, Severity::Info);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
    }

    #[test]
    fn test_machine_info_detect() {
        let info = MachineInfo::detect();
        assert!(!info.cpu.is_empty());
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(info.cores >= 1);
    }

    #[test]
    fn test_parse_cpu_model() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU\n";
        assert_eq!(parse_cpu_model(cpuinfo).as_deref(), Some("Intel(R) Xeon(R) CPU"));
        assert_eq!(parse_cpu_model("processor\t: 0\n"), None);
    }
}
