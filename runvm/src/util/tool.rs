//! External tool execution.
//!
//! Every external program (qemu-img, genisoimage, virsh, netinfo.sh) runs
//! through [`ToolRunner`], so tests can script results and a timeout policy
//! can be added in one place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::{RunvmError, RunvmResult};

/// Captured result of a finished external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Stderr if present, otherwise stdout, otherwise the exit code.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs synchronously.
pub trait ToolRunner: Send + Sync {
    /// Resolve a program name on the search path.
    fn locate(&self, tool: &str) -> RunvmResult<PathBuf>;

    /// Run `program` with `args`, optionally inside `cwd`, and wait for it.
    ///
    /// Only a failure to spawn is an `Err`; a non-zero exit is reported via
    /// [`ToolOutput::success`] so each caller can map it to its own stage.
    fn run(&self, program: &Path, args: &[OsString], cwd: Option<&Path>)
    -> RunvmResult<ToolOutput>;
}

/// Runs tools on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostToolRunner;

impl HostToolRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for HostToolRunner {
    fn locate(&self, tool: &str) -> RunvmResult<PathBuf> {
        which::which(tool).map_err(|_| RunvmError::ToolNotFound {
            tool: tool.to_string(),
        })
    }

    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> RunvmResult<ToolOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        // Scoped to the child; our own working directory never changes.
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::trace!("exec: {cmd:?}");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunvmError::ToolNotFound {
                    tool: program.display().to_string(),
                }
            } else {
                RunvmError::Internal(format!("failed to run {}: {e}", program.display()))
            }
        })?;

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_locate_missing_tool() {
        let err = HostToolRunner::new()
            .locate("runvm-no-such-tool-xyz")
            .unwrap_err();
        assert!(matches!(err, RunvmError::ToolNotFound { tool } if tool == "runvm-no-such-tool-xyz"));
    }

    #[test]
    fn test_run_captures_stdout() {
        let runner = HostToolRunner::new();
        let sh = runner.locate("sh").unwrap();
        let out = runner.run(&sh, &os(&["-c", "echo hello"]), None).unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_in_directory_leaves_own_cwd_untouched() {
        let runner = HostToolRunner::new();
        let sh = runner.locate("sh").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();

        let out = runner.run(&sh, &os(&["-c", "pwd"]), Some(tmp.path())).unwrap();
        assert_eq!(
            PathBuf::from(out.stdout.trim()).canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );

        let failed = runner
            .run(&sh, &os(&["-c", "exit 3"]), Some(tmp.path()))
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));

        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_failure_message_prefers_stderr() {
        let out = ToolOutput {
            success: false,
            code: Some(1),
            stdout: "out".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(out.failure_message(), "err");

        let silent = ToolOutput {
            success: false,
            code: Some(2),
            ..Default::default()
        };
        assert_eq!(silent.failure_message(), "exited with status 2");
    }
}
