//! Command runner - executes step commands as subprocesses

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory does not exist: {0}")]
    MissingWorkingDirectory(PathBuf),
}

/// A command to run on behalf of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Step that issued the command
    pub step_id: String,

    /// Script passed to the shell
    pub script: String,

    pub working_dir: PathBuf,

    pub env: HashMap<String, String>,
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError>;
}

/// Runs scripts through the platform shell (`sh -c`, or `cmd /C` on Windows)
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    shell_args: Vec<String>,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        if cfg!(target_os = "windows") {
            Self::with_shell("cmd", &["/C"])
        } else {
            Self::with_shell("sh", &["-c"])
        }
    }

    /// Use a specific shell, e.g. `("bash", &["-e", "-c"])`
    pub fn with_shell(shell: &str, args: &[&str]) -> Self {
        Self {
            shell: shell.to_string(),
            shell_args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        if !invocation.working_dir.is_dir() {
            return Err(RunnerError::MissingWorkingDirectory(
                invocation.working_dir.clone(),
            ));
        }

        debug!(
            "Running step {} via {}: {}",
            invocation.step_id, self.shell, invocation.script
        );

        let output = Command::new(&self.shell)
            .args(&self.shell_args)
            .arg(&invocation.script)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            warn!(
                "Step {} exited with {:?}: {}",
                invocation.step_id,
                result.exit_code,
                result.stderr.trim()
            );
        }

        Ok(result)
    }
}
