pub mod run;
pub mod sweep;
pub mod version;

use procbench_core::{Config, LaunchMode, SweepPlan};
use std::path::PathBuf;

/// Flags controlling how each run is launched and observed.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunnerArgs {
    /// How the configuration reaches the program: `argument` or `stdin`
    #[arg(long, value_name = "MODE")]
    pub launch_mode: Option<LaunchMode>,

    /// Feed this file on stdin instead of the configuration (stdin mode)
    #[arg(long, value_name = "PATH")]
    pub stdin_file: Option<PathBuf>,

    /// Resource sampling interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Kill a run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<f64>,
}

impl RunnerArgs {
    /// Override plan values with the flags that were given.
    pub fn apply(&self, plan: &mut SweepPlan, config: &Config) {
        if let Some(mode) = self.launch_mode {
            plan.launch_mode = Some(mode);
        }
        if let Some(input) = &self.stdin_file {
            plan.stdin_file = Some(config.resolve(input));
        }
        if let Some(ms) = self.interval_ms {
            plan.sample_interval_ms = Some(ms);
        }
        if let Some(secs) = self.timeout_secs {
            plan.timeout_secs = Some(secs);
        }
    }
}

/// Flags selecting the compiler.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ToolchainArgs {
    /// Compiler executable (default `cc`)
    #[arg(long, value_name = "PROGRAM", env = "PROCBENCH_CC")]
    pub cc: Option<String>,

    /// Compiler argument placed before the source file (repeatable)
    #[arg(long = "cc-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub cc_args: Vec<String>,
}

impl ToolchainArgs {
    pub fn apply(&self, plan: &mut SweepPlan) {
        if self.cc.is_none() && self.cc_args.is_empty() {
            return;
        }
        let mut toolchain = plan.toolchain.take().unwrap_or_default();
        if let Some(cc) = &self.cc {
            toolchain.program.clone_from(cc);
        }
        if !self.cc_args.is_empty() {
            toolchain.args.clone_from(&self.cc_args);
        }
        plan.toolchain = Some(toolchain);
    }
}

/// Format `mean ± stddev` with the given precision.
pub fn format_stat(mean: f64, stddev: f64, precision: usize) -> String {
    format!("{mean:.precision$} ±{stddev:.precision$}")
}
