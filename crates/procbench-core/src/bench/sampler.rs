//! Background resource sampler for a running child process.
//!
//! A dedicated thread probes the process once per interval (CPU%, resident
//! memory, thread count) until it is cancelled or the process goes away.
//! The sample buffer is owned by that thread and handed back when it is
//! joined, so the caller can only read it after `stop()` returned.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One observation of a monitored process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Offset from sampler start.
    pub elapsed: Duration,
    /// CPU usage in percent of one core (may exceed 100 for multi-threaded work).
    pub cpu_percent: f64,
    /// Resident set size in bytes.
    pub resident_memory_bytes: u64,
    /// Number of threads in the process.
    pub thread_count: u32,
}

/// Cooperative stop signal shared with the sampling thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Samples a process on a background thread.
#[derive(Debug)]
pub struct ResourceSampler {
    pid: u32,
    token: CancellationToken,
    handle: Option<JoinHandle<Vec<ResourceSample>>>,
    samples: Vec<ResourceSample>,
}

impl ResourceSampler {
    /// Start sampling `pid` every `interval`.
    ///
    /// The first probe happens one interval after start; a process that is
    /// gone by then yields no samples at all.
    pub fn start(pid: u32, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidSampleInterval);
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("procbench-sampler-{pid}"))
            .spawn(move || sample_loop(pid, interval, &loop_token))?;

        debug!(pid, interval_ms = interval.as_millis() as u64, "sampler started");

        Ok(Self {
            pid,
            token,
            handle: Some(handle),
            samples: Vec::new(),
        })
    }

    /// Signal the sampling thread and wait for it to exit.
    ///
    /// Idempotent. May block for up to one interval.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(samples) => {
                    debug!(pid = self.pid, samples = samples.len(), "sampler stopped");
                    self.samples = samples;
                }
                Err(_) => warn!(pid = self.pid, "sampler thread panicked; samples dropped"),
            }
        }
    }

    /// Samples collected so far, in collection order. Empty until `stop()`.
    #[must_use]
    pub fn samples(&self) -> &[ResourceSample] {
        &self.samples
    }

    /// Stop (if still running) and take ownership of the samples.
    #[must_use]
    pub fn into_samples(mut self) -> Vec<ResourceSample> {
        self.stop();
        std::mem::take(&mut self.samples)
    }
}

impl Drop for ResourceSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop(pid: u32, interval: Duration, token: &CancellationToken) -> Vec<ResourceSample> {
    let mut probe = Probe::new(pid);
    let mut samples = Vec::new();

    loop {
        thread::sleep(interval);
        if token.is_cancelled() {
            break;
        }
        match probe.sample() {
            Ok(sample) => samples.push(sample),
            Err(err) => {
                debug!(pid, error = %err, "sampling ended");
                break;
            }
        }
    }

    samples
}

/// Reads process accounting for a single pid.
struct Probe {
    system: System,
    pid: Pid,
    raw_pid: u32,
    started: Instant,
}

impl Probe {
    fn new(raw_pid: u32) -> Self {
        let mut probe = Self {
            system: System::new(),
            pid: Pid::from_u32(raw_pid),
            raw_pid,
            started: Instant::now(),
        };
        // CPU usage is a delta between refreshes; prime it so the first sample is meaningful.
        probe.refresh();
        probe
    }

    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        self.refresh();

        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| self.access_error("process not found"))?;
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(self.access_error("process exited"));
        }
        let cpu_percent = f64::from(process.cpu_usage());
        let resident_memory_bytes = process.memory();
        let thread_count = read_thread_count(self.raw_pid)?;

        Ok(ResourceSample {
            elapsed: self.started.elapsed(),
            cpu_percent,
            resident_memory_bytes,
            thread_count,
        })
    }

    fn access_error(&self, reason: &str) -> Error {
        Error::SampleAccess {
            pid: self.raw_pid,
            reason: reason.to_string(),
        }
    }
}

#[cfg(target_os = "linux")]
fn read_thread_count(pid: u32) -> Result<u32> {
    match std::fs::read_to_string(format!("/proc/{pid}/status")) {
        Ok(content) => Ok(parse_thread_count(&content).unwrap_or(0)),
        Err(err) => Err(Error::SampleAccess {
            pid,
            reason: match err.kind() {
                std::io::ErrorKind::NotFound => "process not found".to_string(),
                std::io::ErrorKind::PermissionDenied => "access denied".to_string(),
                _ => err.to_string(),
            },
        }),
    }
}

/// Thread counts are only read from procfs; other platforms report 0.
#[cfg(not(target_os = "linux"))]
fn read_thread_count(_pid: u32) -> Result<u32> {
    Ok(0)
}

/// Extract the `Threads:` field from `/proc/<pid>/status` content.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_thread_count(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|value| value.trim().parse().ok())
}

/// Per-run reduction of the sample sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleSummary {
    pub avg_cpu_percent: f64,
    pub avg_memory_mb: f64,
    pub max_memory_mb: f64,
    pub avg_thread_count: f64,
}

impl SampleSummary {
    /// Summarize samples; every field is zero when there are none.
    #[must_use]
    pub fn from_samples(samples: &[ResourceSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let memory_mb = |s: &ResourceSample| s.resident_memory_bytes as f64 / BYTES_PER_MB;

        Self {
            avg_cpu_percent: samples.iter().map(|s| s.cpu_percent).sum::<f64>() / n,
            avg_memory_mb: samples.iter().map(memory_mb).sum::<f64>() / n,
            max_memory_mb: samples.iter().map(memory_mb).fold(0.0, f64::max),
            avg_thread_count: samples.iter().map(|s| f64::from(s.thread_count)).sum::<f64>() / n,
        }
    }
}
