//! External command invocation with report-file capture.
//!
//! Every invocation persists its stdout and stderr next to each other
//! under the reports directory (`<name>` and `<name>.err`), whether the
//! command succeeds or not. Callers pick between two contracts:
//! `run_checked` (non-zero exit is fatal with a caller-supplied
//! message) and `probe` (non-zero exit means "absent", returned as
//! `None`).

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::project::Project;

/// A program plus its ordered argument list. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Single-line rendering for diagnostics and error details.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Execute and capture both streams into the report file pair.
    /// The report directory is created if absent; report files are
    /// written regardless of the exit code.
    pub fn run(&self, report_file: &Path) -> Result<CommandResult> {
        if let Some(parent) = report_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
            })?;
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("run {}", self.command_line())))
            })?;

        std::fs::write(report_file, &output.stdout).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("write {}", report_file.display())))
        })?;
        let err_file = err_report_path(report_file);
        std::fs::write(&err_file, &output.stderr).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("write {}", err_file.display())))
        })?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout_lines: to_lines(&output.stdout),
            stderr_lines: to_lines(&output.stderr),
        })
    }
}

/// Exit code plus order-preserving captured output lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

fn to_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

fn err_report_path(report_file: &Path) -> PathBuf {
    let mut name = report_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.push_str(".err");
    report_file.with_file_name(name)
}

/// Per-stage execution context: where reports go, which verbose
/// property gates diagnostic logging, and the log prefix.
pub struct Execution<'a> {
    project: &'a Project,
    prefix: &'static str,
    verbose_property: &'static str,
}

impl<'a> Execution<'a> {
    pub fn new(
        project: &'a Project,
        prefix: &'static str,
        verbose_property: &'static str,
    ) -> Self {
        Self {
            project,
            prefix,
            verbose_property,
        }
    }

    /// Reports land in a `docker` subdirectory of the reports dir.
    pub fn report_path(&self, report_name: &str) -> PathBuf {
        self.project.reports_dir().join("docker").join(report_name)
    }

    fn verbose(&self) -> bool {
        self.project.get_bool_or("verbose", false)
            || self.project.get_bool_or(self.verbose_property, false)
    }

    fn log_failure(&self, result: &CommandResult, force_log: bool) {
        if self.verbose() || force_log {
            for line in &result.stderr_lines {
                log_status!(self.prefix, "{}", line);
            }
        }
    }

    /// Fatal contract: non-zero exit fails with `error_message`.
    pub fn run_checked(
        &self,
        cmd: &ExternalCommand,
        report_name: &str,
        message: Option<&str>,
        error_message: &str,
        force_log: bool,
    ) -> Result<CommandResult> {
        if let Some(message) = message {
            log_status!(self.prefix, "{}", message);
        }

        let report_file = self.report_path(report_name);
        let result = cmd.run(&report_file)?;
        if result.success() {
            return Ok(result);
        }

        self.log_failure(&result, force_log);
        Err(Error::command_failed(
            error_message,
            cmd.command_line(),
            result.exit_code,
            Some(err_report_path(&report_file).display().to_string()),
        ))
    }

    /// Probe contract: non-zero exit is "not found", returned as `None`.
    pub fn probe(&self, cmd: &ExternalCommand, report_name: &str) -> Result<Option<CommandResult>> {
        let result = cmd.run(&self.report_path(report_name))?;
        if result.success() {
            return Ok(Some(result));
        }

        self.log_failure(&result, false);
        Ok(None)
    }
}

/// Verify a prerequisite tool is invocable by probing `<tool> --version`.
/// Failure aborts before any build step runs.
pub fn verify_can_execute(tool: &str, caller: &str) -> Result<()> {
    let invocable = Command::new(tool)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if invocable {
        Ok(())
    } else {
        Err(Error::prerequisite_missing(tool, caller))
    }
}
