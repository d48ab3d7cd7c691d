use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for procbench operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid sweep plan: {0}")]
    InvalidPlan(String),

    #[error("Sample interval must be greater than zero")]
    InvalidSampleInterval,

    #[error("Failed to start toolchain `{program}`: {source}")]
    ToolchainSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compilation of {} failed ({status}): {stderr}", .source_path.display())]
    Compilation {
        source_path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot sample process {pid}: {reason}")]
    SampleAccess { pid: u32, reason: String },

    #[error("Run exceeded the {limit:?} timeout and was killed")]
    Timeout { limit: Duration },

    #[error("Run failed: {0}")]
    RunExecution(String),
}

impl Error {
    /// Whether this error means the program could not be built at all.
    ///
    /// These abort the whole sweep of one program; anything else only
    /// costs a single repetition.
    #[must_use]
    pub fn is_compilation(&self) -> bool {
        matches!(self, Self::Compilation { .. } | Self::ToolchainSpawn { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
