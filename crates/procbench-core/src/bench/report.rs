//! Benchmark report: per-configuration statistics and cross-program views.

use crate::bench::runner::{LaunchMode, RunResult};
use crate::bench::scenario::RunConfiguration;
use crate::bench::stats::{stats_of, AggregateStatistics};
use crate::bench::sweep::CompilePolicy;
use crate::bench::{BenchWarning, MachineInfo};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

/// Schema version for benchmark reports. Bump when changing JSON structure.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Sweep parameters as recorded in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    pub repetitions: u32,
    pub compile_policy: CompilePolicy,
    pub launch_mode: LaunchMode,
    /// Toolchain command line, e.g. `cc -pthread -O2`.
    pub toolchain: String,
    pub sample_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub configurations: Vec<RunConfiguration>,
}

/// Aggregate statistics for every per-run metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub latency_seconds: AggregateStatistics,
    pub throughput_lines_per_second: AggregateStatistics,
    pub cpu_utilization_raw: AggregateStatistics,
    pub cpu_utilization_normalized: AggregateStatistics,
    pub avg_cpu_percent: AggregateStatistics,
    pub avg_memory_mb: AggregateStatistics,
    pub max_memory_mb: AggregateStatistics,
    pub avg_thread_count: AggregateStatistics,
    pub user_time_seconds: AggregateStatistics,
    pub system_time_seconds: AggregateStatistics,
}

impl MetricStats {
    #[must_use]
    pub fn from_runs(runs: &[RunResult]) -> Self {
        Self {
            latency_seconds: stats_of(runs, |r| r.latency_seconds),
            throughput_lines_per_second: stats_of(runs, |r| r.throughput_lines_per_second),
            cpu_utilization_raw: stats_of(runs, |r| r.cpu_utilization_raw),
            cpu_utilization_normalized: stats_of(runs, |r| r.cpu_utilization_normalized),
            avg_cpu_percent: stats_of(runs, |r| r.avg_cpu_percent),
            avg_memory_mb: stats_of(runs, |r| r.avg_memory_mb),
            max_memory_mb: stats_of(runs, |r| r.max_memory_mb),
            avg_thread_count: stats_of(runs, |r| r.avg_thread_count),
            user_time_seconds: stats_of(runs, |r| r.user_time_seconds),
            system_time_seconds: stats_of(runs, |r| r.system_time_seconds),
        }
    }
}

/// Statistics of one program under one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationStats {
    pub configuration: RunConfiguration,
    /// Compact identifier of the configuration (e.g. `10-3-6`).
    pub label: String,
    pub successful_repetitions: u32,
    pub failed_repetitions: u32,
    pub metrics: MetricStats,
    /// Individual runs, in execution order.
    pub runs: Vec<RunResult>,
}

impl ConfigurationStats {
    #[must_use]
    pub fn from_runs(
        configuration: RunConfiguration,
        runs: Vec<RunResult>,
        failed_repetitions: u32,
    ) -> Self {
        Self {
            label: configuration.label(),
            configuration,
            successful_repetitions: runs.len() as u32,
            failed_repetitions,
            metrics: MetricStats::from_runs(&runs),
            runs,
        }
    }
}

/// All configurations measured for one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramReport {
    /// Display name (source file name).
    pub program: String,
    pub source: PathBuf,
    pub configurations: Vec<ConfigurationStats>,
}

impl ProgramReport {
    #[must_use]
    pub fn configuration(&self, label: &str) -> Option<&ConfigurationStats> {
        self.configurations.iter().find(|c| c.label == label)
    }
}

/// A program that could not be benchmarked at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramFailure {
    pub program: String,
    pub source: PathBuf,
    pub error: String,
}

/// Metrics offered in cross-program comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Latency,
    Throughput,
    CpuUtilization,
    Memory,
    Threads,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Latency,
        Metric::Throughput,
        Metric::CpuUtilization,
        Metric::Memory,
        Metric::Threads,
    ];

    /// Metrics that get a per-configuration ranking.
    pub const RANKED: [Metric; 3] = [Metric::Latency, Metric::Throughput, Metric::CpuUtilization];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Throughput => "throughput",
            Self::CpuUtilization => "cpu_utilization",
            Self::Memory => "memory",
            Self::Threads => "threads",
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Latency => "Latency",
            Self::Throughput => "Throughput",
            Self::CpuUtilization => "CPU utilization",
            Self::Memory => "Memory",
            Self::Threads => "Threads",
        }
    }

    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Latency => "s",
            Self::Throughput => "lines/s",
            Self::CpuUtilization => "%",
            Self::Memory => "MB",
            Self::Threads => "threads",
        }
    }

    #[must_use]
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Self::Throughput)
    }

    /// The statistics backing this metric.
    #[must_use]
    pub fn select<'a>(&self, metrics: &'a MetricStats) -> &'a AggregateStatistics {
        match self {
            Self::Latency => &metrics.latency_seconds,
            Self::Throughput => &metrics.throughput_lines_per_second,
            Self::CpuUtilization => &metrics.cpu_utilization_raw,
            Self::Memory => &metrics.avg_memory_mb,
            Self::Threads => &metrics.avg_thread_count,
        }
    }

    /// Order two values so the better one comes first.
    fn better(&self, a: f64, b: f64) -> Ordering {
        if self.higher_is_better() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One program's value in a comparison or ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramValue {
    pub program: String,
    pub mean: f64,
    pub stddev: f64,
}

/// One configuration row of a pivoted comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub configuration: String,
    /// Programs that have results for this configuration, in program order.
    pub values: Vec<ProgramValue>,
}

/// A metric pivoted as configuration × program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub rows: Vec<ComparisonRow>,
}

/// Programs ordered best-first for one metric under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub configuration: String,
    pub metric: Metric,
    pub order: Vec<ProgramValue>,
}

/// Best (program, configuration) for a metric across the whole sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub metric: Metric,
    pub program: String,
    pub configuration: String,
    pub mean: f64,
}

/// Complete sweep report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub schema_version: u32,
    pub procbench_version: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub machine: MachineInfo,
    pub params: SweepSummary,
    pub programs: Vec<ProgramReport>,
    pub failures: Vec<ProgramFailure>,
    pub comparisons: Vec<MetricComparison>,
    pub rankings: Vec<Ranking>,
    pub best: Vec<Highlight>,
    pub warnings: Vec<BenchWarning>,
}

impl BenchmarkReport {
    /// Create an empty report stamped with the current time and host.
    #[must_use]
    pub fn new(params: SweepSummary) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            procbench_version: crate::version::VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            machine: MachineInfo::detect(),
            params,
            programs: Vec::new(),
            failures: Vec::new(),
            comparisons: Vec::new(),
            rankings: Vec::new(),
            best: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_program(&mut self, program: ProgramReport) {
        self.programs.push(program);
    }

    pub fn add_failure(&mut self, failure: ProgramFailure) {
        self.failures.push(failure);
    }

    pub fn add_warning(&mut self, warning: BenchWarning) {
        self.warnings.push(warning);
    }

    /// True when no configuration of any program produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.iter().all(|p| p.configurations.is_empty())
    }

    /// Derive comparisons, rankings and highlights from the program results.
    pub fn finalize(&mut self) {
        let labels = self.configuration_labels();
        self.comparisons = Metric::ALL
            .iter()
            .map(|&metric| self.compare(metric, &labels))
            .collect();
        self.rankings = labels
            .iter()
            .flat_map(|label| Metric::RANKED.iter().map(move |&m| (label, m)))
            .filter_map(|(label, metric)| self.rank(metric, label))
            .collect();
        self.best = [Metric::Latency, Metric::Throughput]
            .iter()
            .filter_map(|&metric| self.best_for(metric))
            .collect();
    }

    /// Configuration labels in first-seen order across programs.
    #[must_use]
    pub fn configuration_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for stats in self.programs.iter().flat_map(|p| &p.configurations) {
            if !labels.contains(&stats.label) {
                labels.push(stats.label.clone());
            }
        }
        labels
    }

    fn values_for(&self, metric: Metric, label: &str) -> Vec<ProgramValue> {
        self.programs
            .iter()
            .filter_map(|program| {
                let stats = metric.select(&program.configuration(label)?.metrics);
                Some(ProgramValue {
                    program: program.program.clone(),
                    mean: stats.mean,
                    stddev: stats.stddev,
                })
            })
            .collect()
    }

    fn compare(&self, metric: Metric, labels: &[String]) -> MetricComparison {
        MetricComparison {
            metric,
            rows: labels
                .iter()
                .map(|label| ComparisonRow {
                    configuration: label.clone(),
                    values: self.values_for(metric, label),
                })
                .collect(),
        }
    }

    /// Rank programs for `metric` under `label`; ties keep program order.
    #[must_use]
    pub fn rank(&self, metric: Metric, label: &str) -> Option<Ranking> {
        let mut order = self.values_for(metric, label);
        if order.is_empty() {
            return None;
        }
        order.sort_by(|a, b| metric.better(a.mean, b.mean));
        Some(Ranking {
            configuration: label.to_string(),
            metric,
            order,
        })
    }

    fn best_for(&self, metric: Metric) -> Option<Highlight> {
        self.programs
            .iter()
            .flat_map(|program| {
                program.configurations.iter().map(move |stats| Highlight {
                    metric,
                    program: program.program.clone(),
                    configuration: stats.label.clone(),
                    mean: metric.select(&stats.metrics).mean,
                })
            })
            .min_by(|a, b| metric.better(a.mean, b.mean))
    }
}
