#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod bench;
pub mod config;
pub mod error;
pub mod version;

pub use bench::{
    compile, compute_stats, discover_programs, run_sweep, AggregateStatistics, BenchmarkReport,
    BenchmarkRunner, CompilePolicy, CompiledProgram, LaunchMode, ResourceSample, ResourceSampler,
    RunConfiguration, RunResult, RunnerOptions, SweepParams, Toolchain,
};
pub use config::{Config, SweepPlan};
pub use error::{Error, Result};
pub use version::VERSION;
