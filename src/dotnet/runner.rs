//! External process execution
//!
//! `CommandRunner` is the seam between the package manager and the OS so the
//! upgrade pipeline can be driven by scripted output in tests.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::types::{NuplanError, Result};

/// Captured result of one process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...`, failing only when the process cannot be spawned
    /// or exceeds `timeout`. A non-zero exit is reported through the output.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput>;
}

/// Spawns real processes on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| NuplanError::process(program, format!("failed to spawn: {}", e)))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| NuplanError::timeout(format!("{} {}", program, first_arg(args)), timeout))?
            .map_err(|e| NuplanError::process(program, e.to_string()))?;

        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn first_arg(args: &[String]) -> &str {
    args.first().map(String::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            status_code: Some(1),
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.combined(), "out\nerr");
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let err = TokioCommandRunner
            .run(
                "nuplan-definitely-not-installed",
                &[],
                None,
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NuplanError::Process { .. }));
    }
}
