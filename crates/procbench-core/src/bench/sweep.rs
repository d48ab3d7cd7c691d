//! Sweep orchestration: programs × configurations × repetitions.
//!
//! Runs are strictly sequential. A program whose compilation fails is
//! recorded as a failure and skipped; a failing repetition is logged and
//! dropped, so the affected configuration aggregates fewer samples.

use crate::bench::codes;
use crate::bench::compiler::{compile, CompiledProgram, Toolchain};
use crate::bench::report::{
    BenchmarkReport, ConfigurationStats, ProgramFailure, ProgramReport, SweepSummary,
};
use crate::bench::runner::{BenchmarkRunner, RunnerOptions};
use crate::bench::scenario::{default_configurations, RunConfiguration};
use crate::bench::BenchWarning;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Default number of repetitions per configuration.
pub const DEFAULT_REPETITIONS: u32 = 5;

/// Default source file extension for program discovery.
pub const DEFAULT_SOURCE_EXTENSION: &str = "c";

/// Below this many repetitions a `LOW_REPETITIONS` warning is emitted.
const LOW_REPETITIONS_THRESHOLD: u32 = 3;

/// When target programs are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilePolicy {
    /// Once per program, reused for every run.
    #[default]
    PerProgram,
    /// Before every repetition.
    PerRun,
}

impl CompilePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerProgram => "per-program",
            Self::PerRun => "per-run",
        }
    }
}

impl std::fmt::Display for CompilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CompilePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-program" | "per_program" => Ok(Self::PerProgram),
            "per-run" | "per_run" => Ok(Self::PerRun),
            other => Err(Error::InvalidPlan(format!(
                "unknown compile policy `{other}` (expected `per-program` or `per-run`)"
            ))),
        }
    }
}

/// Everything a sweep needs.
#[derive(Debug, Clone)]
pub struct SweepParams {
    /// Source files, benchmarked in this order.
    pub programs: Vec<PathBuf>,
    pub configurations: Vec<RunConfiguration>,
    pub repetitions: u32,
    pub compile_policy: CompilePolicy,
    pub toolchain: Toolchain,
    pub runner: RunnerOptions,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            programs: Vec::new(),
            configurations: default_configurations(),
            repetitions: DEFAULT_REPETITIONS,
            compile_policy: CompilePolicy::default(),
            toolchain: Toolchain::default(),
            runner: RunnerOptions::default(),
        }
    }
}

impl SweepParams {
    /// Reject parameter sets that cannot produce a meaningful sweep.
    pub fn validate(&self) -> Result<()> {
        if self.runner.sample_interval.is_zero() {
            return Err(Error::InvalidSampleInterval);
        }
        if self.programs.is_empty() {
            return Err(Error::InvalidPlan("no programs to benchmark".to_string()));
        }
        if self.configurations.is_empty() {
            return Err(Error::InvalidPlan("no configurations given".to_string()));
        }
        let mut labels = HashSet::new();
        for configuration in &self.configurations {
            let label = configuration.label();
            if !labels.insert(label.clone()) {
                return Err(Error::InvalidPlan(format!(
                    "configuration {label} is listed more than once"
                )));
            }
        }
        if self.repetitions == 0 {
            return Err(Error::InvalidPlan(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if let Some(input) = &self.runner.stdin_file {
            if !input.is_file() {
                return Err(Error::InvalidPlan(format!(
                    "stdin file {} does not exist",
                    input.display()
                )));
            }
        }
        Ok(())
    }

    /// The parameters as recorded in the report.
    #[must_use]
    pub fn summary(&self) -> SweepSummary {
        SweepSummary {
            repetitions: self.repetitions,
            compile_policy: self.compile_policy,
            launch_mode: self.runner.launch_mode,
            toolchain: self.toolchain.command_line(),
            sample_interval_ms: self.runner.sample_interval.as_millis() as u64,
            timeout_ms: self.runner.timeout.map(|t| t.as_millis() as u64),
            configurations: self.configurations.clone(),
        }
    }
}

/// Run the whole sweep and build its report.
///
/// Only invalid parameters and scratch-space failures are errors; per-program
/// and per-run problems end up in the report's failures and warnings.
pub fn run_sweep(params: &SweepParams) -> Result<BenchmarkReport> {
    params.validate()?;
    let runner = BenchmarkRunner::new(params.runner.clone())?;
    let mut report = BenchmarkReport::new(params.summary());

    if params.repetitions < LOW_REPETITIONS_THRESHOLD {
        report.add_warning(BenchWarning::info(
            codes::LOW_REPETITIONS,
            format!(
                "Low repetition count ({}); results may be noisy",
                params.repetitions
            ),
        ));
    }

    for source in &params.programs {
        let name = program_name(source);
        info!(program = %name, "benchmarking program");

        let mut warnings = Vec::new();
        match bench_program(&runner, params, source, &name, &mut warnings) {
            Ok(configurations) => report.add_program(ProgramReport {
                program: name,
                source: source.clone(),
                configurations,
            }),
            Err(err) => {
                error!(program = %name, error = %err, "program skipped");
                warnings.push(BenchWarning::warn(
                    codes::COMPILE_FAILED,
                    format!("{name}: {err}"),
                ));
                report.add_failure(ProgramFailure {
                    program: name,
                    source: source.clone(),
                    error: err.to_string(),
                });
            }
        }
        for warning in warnings {
            report.add_warning(warning);
        }
    }

    report.finalize();
    Ok(report)
}

/// Benchmark every configuration of one program.
///
/// Returns `Err` only when the program cannot be compiled.
fn bench_program(
    runner: &BenchmarkRunner,
    params: &SweepParams,
    source: &Path,
    name: &str,
    warnings: &mut Vec<BenchWarning>,
) -> Result<Vec<ConfigurationStats>> {
    let shared = match params.compile_policy {
        CompilePolicy::PerProgram => Some(compile(&params.toolchain, source)?),
        CompilePolicy::PerRun => None,
    };

    let mut results = Vec::with_capacity(params.configurations.len());
    for configuration in &params.configurations {
        info!(program = name, %configuration, "running configuration");

        let mut runs = Vec::with_capacity(params.repetitions as usize);
        let mut failed = 0u32;
        for repetition in 1..=params.repetitions {
            debug!(repetition, of = params.repetitions, "repetition");

            let mut fresh: Option<CompiledProgram> = None;
            let program = match &shared {
                Some(program) => program,
                None => &*fresh.insert(compile(&params.toolchain, source)?),
            };

            match runner.run(program, configuration) {
                Ok(result) => runs.push(result),
                Err(err) => {
                    warn!(
                        program = name,
                        configuration = %configuration.label(),
                        repetition,
                        error = %err,
                        "repetition failed"
                    );
                    failed += 1;
                    warnings.push(BenchWarning::warn(
                        codes::RUN_FAILED,
                        format!(
                            "{name} [{}] repetition {repetition}: {err}",
                            configuration.label()
                        ),
                    ));
                }
            }
        }

        let nonzero = runs.iter().filter(|r| r.exit_code != Some(0)).count();
        if nonzero > 0 {
            warnings.push(BenchWarning::info(
                codes::NONZERO_EXIT,
                format!(
                    "{name} [{}]: {nonzero} run(s) exited unsuccessfully",
                    configuration.label()
                ),
            ));
        }

        if runs.is_empty() {
            warnings.push(BenchWarning::warn(
                codes::NO_SUCCESSFUL_RUNS,
                format!(
                    "{name} [{}]: no successful repetitions, configuration omitted",
                    configuration.label()
                ),
            ));
            continue;
        }

        results.push(ConfigurationStats::from_runs(
            configuration.clone(),
            runs,
            failed,
        ));
    }

    Ok(results)
}

/// Display name of a program: its file name.
#[must_use]
pub fn program_name(source: &Path) -> String {
    source.file_name().map_or_else(
        || source.display().to_string(),
        |n| n.to_string_lossy().to_string(),
    )
}

/// Source files in `dir` with the given extension, sorted by path.
pub fn discover_programs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{root}/*.{extension}");

    let mut programs: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::InvalidPlan(format!("bad discovery pattern `{pattern}`: {e}")))?
        .flatten()
        .filter(|path| path.is_file())
        .collect();
    programs.sort();

    debug!(dir = %dir.display(), count = programs.len(), "discovered programs");
    Ok(programs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_compile_policy_parsing() {
        assert_eq!(
            "per-program".parse::<CompilePolicy>().unwrap(),
            CompilePolicy::PerProgram
        );
        assert_eq!(
            "per_run".parse::<CompilePolicy>().unwrap(),
            CompilePolicy::PerRun
        );
        assert!("always".parse::<CompilePolicy>().is_err());
        assert_eq!(CompilePolicy::PerRun.to_string(), "per-run");
    }

    #[test]
    fn test_defaults() {
        let params = SweepParams::default();
        assert_eq!(params.repetitions, 5);
        assert_eq!(params.configurations.len(), 3);
        assert_eq!(params.compile_policy, CompilePolicy::PerProgram);
    }

    #[test]
    fn test_validate_rejects_degenerate_params() {
        let base = SweepParams {
            programs: vec![PathBuf::from("a.c")],
            ..SweepParams::default()
        };
        assert!(base.validate().is_ok());

        let no_programs = SweepParams {
            programs: Vec::new(),
            ..base.clone()
        };
        assert!(matches!(no_programs.validate(), Err(Error::InvalidPlan(_))));

        let no_reps = SweepParams {
            repetitions: 0,
            ..base.clone()
        };
        assert!(matches!(no_reps.validate(), Err(Error::InvalidPlan(_))));

        let no_configs = SweepParams {
            configurations: Vec::new(),
            ..base.clone()
        };
        assert!(matches!(no_configs.validate(), Err(Error::InvalidPlan(_))));

        let mut zero_interval = base.clone();
        zero_interval.runner.sample_interval = Duration::ZERO;
        assert!(matches!(
            zero_interval.validate(),
            Err(Error::InvalidSampleInterval)
        ));

        let duplicated = SweepParams {
            configurations: vec![
                RunConfiguration::from_values(&[10, 3, 6]),
                RunConfiguration::from_values(&[100, 6, 3]),
                RunConfiguration::from_values(&[10, 3, 6]),
            ],
            ..base.clone()
        };
        match duplicated.validate() {
            Err(Error::InvalidPlan(msg)) => assert!(msg.contains("10-3-6"), "{msg}"),
            other => panic!("expected InvalidPlan, got {other:?}"),
        }

        let mut missing_input = base;
        missing_input.runner.stdin_file = Some(PathBuf::from("/nonexistent/procbench-input"));
        assert!(matches!(missing_input.validate(), Err(Error::InvalidPlan(_))));
    }

    #[test]
    fn test_summary_records_params() {
        let mut params = SweepParams {
            programs: vec![PathBuf::from("a.c")],
            repetitions: 2,
            ..SweepParams::default()
        };
        params.runner.timeout = Some(Duration::from_secs(3));
        let summary = params.summary();
        assert_eq!(summary.repetitions, 2);
        assert_eq!(summary.sample_interval_ms, 100);
        assert_eq!(summary.timeout_ms, Some(3000));
        assert_eq!(summary.toolchain, "cc -pthread -O2");
    }

    #[test]
    fn test_program_name() {
        assert_eq!(program_name(Path::new("/tmp/x/sim.c")), "sim.c");
    }

    #[test]
    fn test_discover_programs_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.c"), "").unwrap();
        fs::write(dir.path().join("a.c"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("dir.c")).unwrap();

        let found = discover_programs(dir.path(), ".c").unwrap();
        let names: Vec<String> = found.iter().map(|p| program_name(p)).collect();
        assert_eq!(names, vec!["a.c", "b.c"]);

        assert!(discover_programs(dir.path(), "rs").unwrap().is_empty());
    }

    #[test]
    fn test_discover_programs_escapes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("run[1]");
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("main.c"), "").unwrap();

        let found = discover_programs(&odd, "c").unwrap();
        assert_eq!(found.len(), 1);
    }
}
