//! Gated command execution.
//!
//! The [`CommandExecutor`] trait decouples the workflow engine from actual
//! process spawning. Tests use scripted executors that return predetermined
//! results without touching the system.

use std::collections::BTreeSet;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::output::{
    NO_OUTPUT, REASON_EMPTY, REASON_MALFORMED, REASON_NOT_ALLOWED, truncate_chars,
};
use crate::core::types::{CommandResult, CommandStatus};
use crate::io::config::ExecutorConfig;
use crate::io::process::run_command_with_timeout;

/// Runs the command line a step resolved to.
///
/// `Err` is reserved for failures of the executor itself; rejected, failing and
/// timed-out commands are ordinary [`CommandResult`]s.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command_line: &str) -> Result<CommandResult>;
}

/// Executor that runs allow-listed commands through `sh -c`.
///
/// Only the program name is checked; arguments reach the shell verbatim, so
/// this is only safe inside an already-isolated sandbox.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    allow_list: BTreeSet<String>,
    timeout: Duration,
    output_limit_chars: usize,
}

impl ShellExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            allow_list: config.allow_list.iter().map(|p| p.trim().to_string()).collect(),
            timeout: config.timeout(),
            output_limit_chars: config.output_limit_chars,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_allowed(&self, program: &str) -> bool {
        self.allow_list.contains(program)
    }

    /// Tokenize and check the program name without running anything.
    pub fn gate(&self, command_line: &str) -> Result<(), CommandResult> {
        let line = command_line.trim();
        if line.is_empty() {
            return Err(CommandResult::rejected(REASON_EMPTY));
        }
        let Some(tokens) = shlex::split(line) else {
            return Err(CommandResult::rejected(REASON_MALFORMED));
        };
        let Some(program) = tokens.first() else {
            return Err(CommandResult::rejected(REASON_EMPTY));
        };
        if !self.is_allowed(program) {
            return Err(CommandResult::rejected(REASON_NOT_ALLOWED));
        }
        Ok(())
    }

    fn finish_stream(&self, raw: &str, upstream_truncated: bool) -> String {
        truncate_chars(raw.trim(), self.output_limit_chars, upstream_truncated)
    }
}

impl CommandExecutor for ShellExecutor {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    fn execute(&self, command_line: &str) -> Result<CommandResult> {
        if let Err(rejection) = self.gate(command_line) {
            info!(reason = ?rejection.reason, "command rejected");
            return Ok(rejection);
        }
        let line = command_line.trim();
        info!(command = %line, "executing command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        // Four bytes per char covers any UTF-8 text up to the character cap.
        let byte_limit = self.output_limit_chars.saturating_mul(4).saturating_add(4);
        let output = run_command_with_timeout(cmd, None, self.timeout, byte_limit)
            .context("run shell command")?;

        let stdout = self.finish_stream(&output.stdout_lossy(), output.stdout_truncated > 0);
        let stderr = self.finish_stream(&output.stderr_lossy(), output.stderr_truncated > 0);

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "command timed out");
            return Ok(CommandResult {
                status: CommandStatus::Timeout,
                exit_code: None,
                stdout,
                stderr,
                reason: Some(format!(
                    "command timed out after {}",
                    format_timeout(self.timeout)
                )),
            });
        }

        let result = match output.status.code() {
            Some(0) => CommandResult {
                status: CommandStatus::Success,
                exit_code: Some(0),
                stdout: if stdout.is_empty() {
                    NO_OUTPUT.to_string()
                } else {
                    stdout
                },
                stderr,
                reason: None,
            },
            Some(code) => CommandResult {
                status: CommandStatus::Failure,
                exit_code: Some(code),
                stdout,
                stderr,
                reason: None,
            },
            None => CommandResult {
                status: CommandStatus::Failure,
                exit_code: None,
                stdout,
                stderr,
                reason: Some("terminated by signal".to_string()),
            },
        };
        debug!(status = ?result.status, exit_code = ?result.exit_code, "command finished");
        Ok(result)
    }
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
