// src/exec/request.rs

//! Description of a tool invocation.

use std::path::{Path, PathBuf};

use crate::cmdline::join_command_line;

/// What to run: a command, its ordered arguments, and an optional working
/// directory (the parent process's current directory when absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// The full invocation as a single quoted command line, for logs.
    pub fn display_command(&self) -> String {
        join_command_line(std::iter::once(self.command.as_str()).chain(self.args.iter().map(String::as_str)))
    }
}

/// Lifecycle of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Not started yet.
    Pending,
    /// Spawned and running.
    Running,
    /// Exited on its own.
    CompletedNormally,
    /// Stopped by an explicit `terminate()`.
    Terminated,
    /// Stopped through a cancellation token.
    Cancelled,
}
