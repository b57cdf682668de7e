//! Typed invocation of the git executable
//!
//! Every git subprocess goes through [`GitCommand`], which records the program,
//! arguments, working directory and the exit codes that count as success, and
//! turns spawn failures and unexpected exit codes into [`CommandError`] values.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;

/// Failure of a single git invocation
#[derive(Error, Debug)]
pub enum CommandError {
    /// The executable could not be started at all
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited with a code outside the expected set
    #[error("`{command}` exited with {}: {stderr}", describe_code(.code))]
    Status {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Captured stderr, if the process got as far as running
    pub fn stderr(&self) -> &str {
        match self {
            CommandError::Spawn { .. } => "",
            CommandError::Status { stderr, .. } => stderr,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Captured result of a finished git invocation
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Exit status of the process
    pub status: ExitStatus,
    /// Raw stdout bytes (empty when stdout was streamed elsewhere)
    pub stdout: Vec<u8>,
    /// stderr, lossily decoded and trimmed
    pub stderr: String,
}

impl GitOutput {
    /// Non-empty stdout lines, trimmed
    pub fn stdout_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Builder for a git subprocess
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl GitCommand {
    /// Start a command for the given git executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run inside the given directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the child
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Human-readable command line for logs and error messages
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn check(&self, output: std::process::Output) -> Result<GitOutput, CommandError> {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code();

        if code != Some(0) {
            return Err(CommandError::Status {
                command: self.describe(),
                code,
                stderr,
            });
        }

        Ok(GitOutput {
            status: output.status,
            stdout: output.stdout,
            stderr,
        })
    }

    /// Run to completion, capturing stdout and stderr
    pub fn output(&self) -> Result<GitOutput, CommandError> {
        tracing::debug!(command = %self.describe(), cwd = ?self.cwd, "Running git");

        let output = self
            .build()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: self.describe(),
                source,
            })?;

        self.check(output)
    }

    /// Start the process with stdout and stderr piped
    ///
    /// The caller takes `child.stdout` to stream it, then hands the child
    /// back to [`GitCommand::finish`].
    pub fn spawn_piped(&self) -> Result<Child, CommandError> {
        tracing::debug!(command = %self.describe(), cwd = ?self.cwd, "Spawning git");

        self.build()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: self.describe(),
                source,
            })
    }

    /// Wait for a child started with [`GitCommand::spawn_piped`] and check its status
    pub fn finish(&self, child: Child) -> Result<GitOutput, CommandError> {
        let output = child.wait_with_output().map_err(|source| CommandError::Spawn {
            command: self.describe(),
            source,
        })?;

        self.check(output)
    }
}
