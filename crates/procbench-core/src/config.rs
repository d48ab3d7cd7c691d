use crate::bench::compiler::Toolchain;
use crate::bench::runner::{LaunchMode, RunnerOptions};
use crate::bench::sampler::DEFAULT_SAMPLE_INTERVAL;
use crate::bench::scenario::{default_configurations, RunConfiguration, DEFAULT_PARAMETER_NAMES};
use crate::bench::sweep::{
    discover_programs, CompilePolicy, SweepParams, DEFAULT_REPETITIONS, DEFAULT_SOURCE_EXTENSION,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the procbench CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Resolve `path` against the working directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve(&self.cwd, path)
    }
}

/// A sweep described in a JSON file.
///
/// Every field is optional; missing ones fall back to the built-in defaults.
/// Relative paths are resolved against the directory passed to
/// [`SweepPlan::into_params`] (the plan file's directory when loaded).
///
/// ```json
/// {
///   "programs": ["sim_mutex.c", "sim_atomic.c"],
///   "configurations": [[10, 3, 6], [100, 6, 3]],
///   "repetitions": 5,
///   "toolchain": { "program": "gcc", "args": ["-pthread"] },
///   "timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepPlan {
    /// Source files. When empty, sources are discovered in `source_dir`.
    pub programs: Vec<PathBuf>,
    pub source_dir: Option<PathBuf>,
    /// Extension used for discovery (default `c`).
    pub extension: Option<String>,
    /// Integer values of each configuration, in file order.
    pub configurations: Vec<Vec<i64>>,
    pub parameter_names: Vec<String>,
    pub repetitions: Option<u32>,
    pub compile_policy: Option<CompilePolicy>,
    pub toolchain: Option<Toolchain>,
    pub launch_mode: Option<LaunchMode>,
    pub stdin_file: Option<PathBuf>,
    pub sample_interval_ms: Option<u64>,
    pub timeout_secs: Option<f64>,
}

impl SweepPlan {
    /// Load a plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Turn the plan into sweep parameters.
    ///
    /// Performs program discovery when no programs are listed.
    pub fn into_params(self, base_dir: &Path) -> Result<SweepParams> {
        let programs = if self.programs.is_empty() {
            let dir = self
                .source_dir
                .as_deref()
                .map_or_else(|| base_dir.to_path_buf(), |d| resolve(base_dir, d));
            let extension = self.extension.as_deref().unwrap_or(DEFAULT_SOURCE_EXTENSION);
            discover_programs(&dir, extension)?
        } else {
            self.programs.iter().map(|p| resolve(base_dir, p)).collect()
        };

        let configurations = if self.configurations.is_empty() {
            default_configurations()
        } else if self.parameter_names.is_empty() {
            self.configurations
                .iter()
                .map(|values| RunConfiguration::with_names(values, &DEFAULT_PARAMETER_NAMES))
                .collect()
        } else {
            self.configurations
                .iter()
                .map(|values| RunConfiguration::with_names(values, self.parameter_names.as_slice()))
                .collect()
        };

        let timeout = self
            .timeout_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| {
                        Error::InvalidPlan(format!("timeout must be a positive duration, got {secs}"))
                    })
            })
            .transpose()?;

        let runner = RunnerOptions {
            launch_mode: self.launch_mode.unwrap_or_default(),
            stdin_file: self.stdin_file.as_deref().map(|p| resolve(base_dir, p)),
            sample_interval: self
                .sample_interval_ms
                .map_or(DEFAULT_SAMPLE_INTERVAL, Duration::from_millis),
            timeout,
            ..RunnerOptions::default()
        };

        Ok(SweepParams {
            programs,
            configurations,
            repetitions: self.repetitions.unwrap_or(DEFAULT_REPETITIONS),
            compile_policy: self.compile_policy.unwrap_or_default(),
            toolchain: self.toolchain.unwrap_or_default(),
            runner,
        })
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_config_builder() {
        let config = Config::new(PathBuf::from("/work"))
            .with_verbosity(2)
            .with_json_logs(true);
        assert_eq!(config.verbosity, 2);
        assert!(config.json_logs);
        assert_eq!(config.resolve(Path::new("a.c")), PathBuf::from("/work/a.c"));
        assert_eq!(config.resolve(Path::new("/abs/a.c")), PathBuf::from("/abs/a.c"));
    }

    #[test]
    fn test_empty_plan_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sim.c"), "").unwrap();

        let params = SweepPlan::default().into_params(dir.path()).unwrap();
        assert_eq!(params.programs, vec![dir.path().join("sim.c")]);
        assert_eq!(params.repetitions, DEFAULT_REPETITIONS);
        assert_eq!(params.configurations.len(), 3);
        assert_eq!(params.runner.sample_interval, DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(params.runner.timeout, None);
        assert_eq!(params.toolchain, Toolchain::default());
    }

    #[test]
    fn test_plan_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(
            &path,
            r#"{
                "programs": ["a.c", "/opt/b.c"],
                "configurations": [[1, 2], [3, 4]],
                "parameter_names": ["threads", "size"],
                "repetitions": 2,
                "compile_policy": "per_run",
                "toolchain": { "program": "gcc" },
                "launch_mode": "stdin",
                "sample_interval_ms": 25,
                "timeout_secs": 1.5
            }"#,
        )
        .unwrap();

        let plan = SweepPlan::load(&path).unwrap();
        let params = plan.into_params(dir.path()).unwrap();

        assert_eq!(
            params.programs,
            vec![dir.path().join("a.c"), PathBuf::from("/opt/b.c")]
        );
        assert_eq!(params.configurations[1].get("size"), Some(4));
        assert_eq!(params.repetitions, 2);
        assert_eq!(params.compile_policy, CompilePolicy::PerRun);
        assert_eq!(params.toolchain.command_line(), "gcc");
        assert_eq!(params.runner.launch_mode, LaunchMode::Stdin);
        assert_eq!(params.runner.sample_interval, Duration::from_millis(25));
        assert_eq!(params.runner.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, r#"{ "repetition": 3 }"#).unwrap();
        assert!(matches!(SweepPlan::load(&path), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_missing_plan_is_read_error() {
        let err = SweepPlan::load(Path::new("/nonexistent/procbench/plan.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let plan = SweepPlan {
            programs: vec![PathBuf::from("a.c")],
            timeout_secs: Some(-1.0),
            ..SweepPlan::default()
        };
        assert!(matches!(
            plan.into_params(Path::new("/tmp")),
            Err(Error::InvalidPlan(_))
        ));
    }
}
