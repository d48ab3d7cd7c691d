//! Toolchain invocation for target programs.
//!
//! Each compilation gets a private temporary directory for its executable;
//! dropping the [`CompiledProgram`] removes it, whatever path the caller takes
//! out of the benchmark.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

/// Max stderr bytes kept in a compilation error.
const STDERR_TAIL_BYTES: usize = 2000;

/// The external compiler used to build targets.
///
/// Invoked as `program args... <source> -o <executable>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            program: "cc".to_string(),
            args: vec!["-pthread".to_string(), "-O2".to_string()],
        }
    }
}

impl Toolchain {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whether the compiler can be found on PATH (or at the given path).
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Human-readable command line, e.g. `cc -pthread -O2`.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An executable ready to be benchmarked.
#[derive(Debug)]
pub struct CompiledProgram {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl CompiledProgram {
    /// Wrap an existing executable. It is left in place on drop.
    #[must_use]
    pub fn prebuilt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether dropping this value deletes the executable.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Compile `source` with `toolchain` into a scoped executable.
pub fn compile(toolchain: &Toolchain, source: &Path) -> Result<CompiledProgram> {
    let scratch = tempfile::Builder::new().prefix("procbench-").tempdir()?;
    let stem = source
        .file_stem()
        .map_or_else(|| "program".to_string(), |s| s.to_string_lossy().to_string());
    let executable = scratch.path().join(format!("{stem}.bin"));

    debug!(
        toolchain = %toolchain.command_line(),
        source = %source.display(),
        "compiling"
    );

    let output = Command::new(&toolchain.program)
        .args(&toolchain.args)
        .arg(source)
        .arg("-o")
        .arg(&executable)
        .output()
        .map_err(|source| Error::ToolchainSpawn {
            program: toolchain.program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::Compilation {
            source_path: source.to_path_buf(),
            status: output.status.to_string(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    if !executable.is_file() {
        return Err(Error::Compilation {
            source_path: source.to_path_buf(),
            status: output.status.to_string(),
            stderr: "toolchain reported success but produced no executable".to_string(),
        });
    }

    Ok(CompiledProgram {
        path: executable,
        scratch: Some(scratch),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A "compiler" that copies the source and marks it executable.
    #[cfg(unix)]
    fn copy_toolchain() -> Toolchain {
        Toolchain::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"cp "$0" "$2" && chmod +x "$2""#.to_string(),
            ],
        )
    }

    #[test]
    fn test_default_toolchain() {
        let tc = Toolchain::default();
        assert_eq!(tc.command_line(), "cc -pthread -O2");
    }

    #[test]
    fn test_nonzero_toolchain_exit_is_compilation_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.c");
        fs::write(&source, "int main( {").unwrap();

        let err = compile(&Toolchain::new("false", vec![]), &source).unwrap_err();
        match err {
            Error::Compilation { source_path, .. } => assert_eq!(source_path, source),
            other => panic!("expected compilation error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_toolchain_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.c");
        fs::write(&source, "int main(void) { return 0; }").unwrap();

        let err = compile(
            &Toolchain::new("procbench-no-such-compiler", vec![]),
            &source,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolchainSpawn { .. }));
        assert!(err.is_compilation());
    }

    #[test]
    #[cfg(unix)]
    fn test_success_without_executable_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.c");
        fs::write(&source, "").unwrap();

        let err = compile(&Toolchain::new("true", vec![]), &source).unwrap_err();
        assert!(matches!(err, Error::Compilation { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_compiled_executable_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hello.sh");
        fs::write(&source, "#!/bin/sh\necho hello\n").unwrap();

        let program = compile(&copy_toolchain(), &source).unwrap();
        let path = program.path().to_path_buf();
        assert!(program.is_owned());
        assert!(path.is_file());
        assert_eq!(path.file_name().unwrap(), "hello.bin");

        drop(program);
        assert!(!path.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_prebuilt_is_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tool");
        fs::write(&exe, "").unwrap();

        let program = CompiledProgram::prebuilt(&exe);
        assert!(!program.is_owned());
        drop(program);
        assert!(exe.exists());
    }

    #[test]
    fn test_stderr_tail_truncates_long_output() {
        let long = "e".repeat(STDERR_TAIL_BYTES * 2);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES + 3);
        assert_eq!(stderr_tail(b"  short  \n"), "short");
    }
}
