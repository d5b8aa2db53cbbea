// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! All child processes go through a [`Shell`]. Nothing else in the crate
//! spawns processes. A non-zero exit status is always an error, so no later
//! deployment step runs on top of a command that did not finish its job.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Single command line to execute.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<Arg>,
    cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    value: String,
    secret: bool,
}

impl CommandLine {
    /// Construct new command line for target program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Append listing of arguments.
    pub fn args(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for value in values {
            self = self.arg(value);
        }
        self
    }

    /// Append `--name=value` option.
    pub fn opt(self, name: &str, value: impl AsRef<str>) -> Self {
        self.arg(format!("--{name}={}", value.as_ref()))
    }

    /// Append `--name=value` option whose value is masked when displayed.
    pub fn secret_opt(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.args.push(Arg {
            value: format!("--{name}={}", value.as_ref()),
            secret: true,
        });
        self
    }

    /// Run command from target working directory.
    pub fn current_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw arguments, secrets included.
    pub fn arg_values(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|arg| arg.value.as_str())
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Check if command line carries exact argument.
    pub fn has_arg(&self, value: &str) -> bool {
        self.arg_values().any(|arg| arg == value)
    }
}

impl Display for CommandLine {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&quote(&self.program))?;
        for arg in &self.args {
            if arg.secret {
                let name = arg.value.split_once('=').map_or("", |(name, _)| name);
                write!(fmt, " {name}=****")?;
            } else {
                write!(fmt, " {}", quote(&arg.value))?;
            }
        }

        Ok(())
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c));
    if plain {
        value.into()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Executes command lines.
pub trait Shell {
    /// Run command line to completion and capture its standard output.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Spawn`] if the process cannot be started.
    /// - Return [`Error::CommandFailed`] if the process exits unsuccessfully.
    fn run(&self, command: &CommandLine) -> Result<Vec<String>>;
}

/// Shell backed by real child processes.
#[derive(Debug, Default, Clone)]
pub struct SystemShell;

impl SystemShell {
    pub fn new() -> Self {
        Self
    }
}

impl Shell for SystemShell {
    #[instrument(skip(self, command), level = "debug")]
    fn run(&self, command: &CommandLine) -> Result<Vec<String>> {
        debug!("execute: {command}");

        let mut process = Command::new(command.program());
        process.args(command.arg_values());
        if let Some(cwd) = command.working_dir() {
            process.current_dir(cwd);
        }

        let output = process.output().map_err(|err| Error::Spawn {
            command: command.to_string(),
            source: err,
        })?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
        let lines = stdout.lines().map(str::to_owned).collect::<Vec<_>>();

        debug!("status: {}", output.status);
        for line in &lines {
            debug!("stdout: {line}");
        }
        for line in stderr.lines() {
            debug!("stderr: {line}");
        }

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                status: output.status.code(),
            });
        }

        Ok(lines)
    }
}

/// Command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Process exited unsuccessfully.
    #[error("command `{command}` failed with exit status {}", display_status(.status))]
    CommandFailed {
        command: String,
        status: Option<i32>,
    },

    /// Process could not be started.
    #[error("failed to execute `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "<signal>".into(), |code| code.to_string())
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
