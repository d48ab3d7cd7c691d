//! Single benchmark run: launch, sample, time and derive metrics.
//!
//! Wall-clock time is measured from just before spawn to just after the child
//! exited and its output pipes were fully drained. CPU time comes from the
//! `RUSAGE_CHILDREN` delta around the reaped child. The resource sampler runs
//! strictly inside that window.

use crate::bench::compiler::CompiledProgram;
use crate::bench::rusage::{self, CpuTimes};
use crate::bench::sampler::{ResourceSample, ResourceSampler, SampleSummary, DEFAULT_SAMPLE_INTERVAL};
use crate::bench::scenario::RunConfiguration;
use crate::bench::MachineInfo;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name of the configuration file written before each run.
pub const CONFIG_FILE_NAME: &str = "procbench-config.txt";

/// How often the exit status is polled while a timeout is armed.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How the configuration reaches the target program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// `[executable, config_path]`.
    #[default]
    ConfigArgument,
    /// `[executable]` with stdin redirected from the config (or input) file.
    Stdin,
}

impl LaunchMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigArgument => "argument",
            Self::Stdin => "stdin",
        }
    }
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LaunchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argument" | "arg" | "config_argument" => Ok(Self::ConfigArgument),
            "stdin" => Ok(Self::Stdin),
            other => Err(Error::InvalidPlan(format!(
                "unknown launch mode `{other}` (expected `argument` or `stdin`)"
            ))),
        }
    }
}

/// Options shared by every run of a runner.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub launch_mode: LaunchMode,
    /// File fed to stdin in [`LaunchMode::Stdin`]; defaults to the config file.
    pub stdin_file: Option<PathBuf>,
    /// Resource sampling cadence; must be non-zero.
    pub sample_interval: Duration,
    /// Kill the child and fail the run once this much wall-clock time passed.
    pub timeout: Option<Duration>,
    /// Core count used for `cpu_utilization_normalized`.
    pub cores: u32,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            launch_mode: LaunchMode::default(),
            stdin_file: None,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            timeout: None,
            cores: MachineInfo::detect_cores(),
        }
    }
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Wall-clock time from spawn to exit and drained output.
    pub latency_seconds: f64,
    /// Output lines per wall-clock second (0 when the wall time is not positive).
    pub throughput_lines_per_second: f64,
    pub user_time_seconds: f64,
    pub system_time_seconds: f64,
    /// `(user + system) / wall * 100`; exceeds 100 for multi-threaded work.
    pub cpu_utilization_raw: f64,
    /// `cpu_utilization_raw` divided by the core count.
    pub cpu_utilization_normalized: f64,
    /// Mean of the sampler's CPU% readings.
    pub avg_cpu_percent: f64,
    pub avg_memory_mb: f64,
    pub max_memory_mb: f64,
    pub avg_thread_count: f64,
    pub lines_processed: u64,
    /// Number of resource samples behind the sampler-based fields.
    pub sample_count: usize,
    /// Exit code of the target; `None` if it was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Raw measurements of a run, before derivation.
#[derive(Debug, Clone, Copy)]
pub struct RunMeasurements<'a> {
    pub wall: Duration,
    pub cpu: CpuTimes,
    pub lines: u64,
    pub samples: &'a [ResourceSample],
    pub cores: u32,
    pub exit_code: Option<i32>,
}

impl RunResult {
    /// Derive every metric from raw measurements.
    #[must_use]
    pub fn from_measurements(m: &RunMeasurements<'_>) -> Self {
        let wall_seconds = m.wall.as_secs_f64();
        let raw = cpu_utilization_raw(&m.cpu, wall_seconds);
        let summary = SampleSummary::from_samples(m.samples);

        Self {
            latency_seconds: wall_seconds,
            throughput_lines_per_second: throughput(m.lines, wall_seconds),
            user_time_seconds: m.cpu.user.as_secs_f64(),
            system_time_seconds: m.cpu.system.as_secs_f64(),
            cpu_utilization_raw: raw,
            cpu_utilization_normalized: normalize_by_cores(raw, m.cores),
            avg_cpu_percent: summary.avg_cpu_percent,
            avg_memory_mb: summary.avg_memory_mb,
            max_memory_mb: summary.max_memory_mb,
            avg_thread_count: summary.avg_thread_count,
            lines_processed: m.lines,
            sample_count: m.samples.len(),
            exit_code: m.exit_code,
        }
    }
}

/// Lines per second; 0 when `wall_seconds <= 0`.
#[must_use]
pub fn throughput(lines: u64, wall_seconds: f64) -> f64 {
    if wall_seconds > 0.0 {
        lines as f64 / wall_seconds
    } else {
        0.0
    }
}

/// CPU time over wall time in percent, not divided by cores.
#[must_use]
pub fn cpu_utilization_raw(cpu: &CpuTimes, wall_seconds: f64) -> f64 {
    if wall_seconds > 0.0 {
        cpu.total().as_secs_f64() / wall_seconds * 100.0
    } else {
        0.0
    }
}

/// Scale a raw utilization to a 0-100 range across `cores`.
#[must_use]
pub fn normalize_by_cores(raw: f64, cores: u32) -> f64 {
    raw / f64::from(cores.max(1))
}

/// Runs compiled programs one at a time.
#[derive(Debug)]
pub struct BenchmarkRunner {
    options: RunnerOptions,
    scratch: TempDir,
}

impl BenchmarkRunner {
    /// Create a runner with its own scratch directory for configuration files.
    pub fn new(options: RunnerOptions) -> Result<Self> {
        if options.sample_interval.is_zero() {
            return Err(Error::InvalidSampleInterval);
        }
        let scratch = tempfile::Builder::new().prefix("procbench-run-").tempdir()?;
        Ok(Self { options, scratch })
    }

    /// Where the configuration file is written before each run.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.scratch.path().join(CONFIG_FILE_NAME)
    }

    /// Execute `program` once under `configuration`.
    pub fn run(
        &self,
        program: &CompiledProgram,
        configuration: &RunConfiguration,
    ) -> Result<RunResult> {
        let config_path = self.config_path();
        configuration.write_to(&config_path)?;
        let mut command = self.command(program.path(), &config_path)?;

        let ru_before = rusage::snapshot_children();
        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: program.path().to_path_buf(),
            source,
        })?;

        let mut sampler = match ResourceSampler::start(child.id(), self.options.sample_interval) {
            Ok(sampler) => sampler,
            Err(err) => {
                reap(&mut child);
                return Err(err);
            }
        };

        let stdout = drain(child.stdout.take(), "stdout");
        let stderr = drain(child.stderr.take(), "stderr");
        // Reader threads are left detached on failure: a surviving grandchild
        // may still hold the pipes open.
        let status = match wait_for_exit(&mut child, self.options.timeout) {
            Ok(status) => status,
            Err(err) => {
                sampler.stop();
                return Err(err);
            }
        };
        let stdout = join_output(stdout)?;
        let stderr = join_output(stderr)?;
        let wall = start.elapsed();
        let ru_after = rusage::snapshot_children();
        let samples = sampler.into_samples();

        if !status.success() {
            warn!(
                program = %program.path().display(),
                %status,
                "target exited unsuccessfully"
            );
        }
        if !stderr.is_empty() {
            debug!(bytes = stderr.len(), tail = %tail(&stderr), "target stderr");
        }

        let lines = String::from_utf8_lossy(&stdout).lines().count() as u64;

        Ok(RunResult::from_measurements(&RunMeasurements {
            wall,
            cpu: rusage::delta(ru_before, ru_after),
            lines,
            samples: &samples,
            cores: self.options.cores,
            exit_code: status.code(),
        }))
    }

    fn command(&self, executable: &Path, config_path: &Path) -> Result<Command> {
        let mut command = Command::new(executable);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        match self.options.launch_mode {
            LaunchMode::ConfigArgument => {
                command.arg(config_path).stdin(Stdio::null());
            }
            LaunchMode::Stdin => {
                let input = self.options.stdin_file.as_deref().unwrap_or(config_path);
                command.stdin(File::open(input)?);
            }
        }

        Ok(command)
    }
}

/// Read a pipe to EOF on its own thread so the child never blocks on a full pipe.
fn drain<R>(pipe: Option<R>, name: &str) -> Option<JoinHandle<std::io::Result<Vec<u8>>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    thread::Builder::new()
        .name(format!("procbench-{name}"))
        .spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
        .ok()
}

fn join_output(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| Error::RunExecution("output reader thread panicked".to_string()))?
        .map_err(Error::from)
}

fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    let Some(deadline) = Instant::now().checked_add(limit) else {
        debug!(?limit, "timeout beyond the clock range; waiting without a deadline");
        return Ok(child.wait()?);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!(pid = child.id(), ?limit, "run timed out; killing target");
            reap(child);
            return Err(Error::Timeout { limit });
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().rev().take(5).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
}
