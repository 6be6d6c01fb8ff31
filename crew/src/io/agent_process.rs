//! Text generation backed by an external agent CLI.

use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::agents::{CollaboratorError, TextGenerator};
use crate::io::config::AgentConfig;
use crate::io::process::run_command_with_timeout;

/// Spawns the configured agent command once per call.
///
/// The prompt goes to stdin and the trimmed stdout is the response.
#[derive(Debug, Clone)]
pub struct AgentProcess {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl AgentProcess {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TextGenerator for AgentProcess {
    #[instrument(skip_all, fields(program = self.command.first().map(String::as_str).unwrap_or("")))]
    fn generate(&self, context: &str) -> Result<String, CollaboratorError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| CollaboratorError::Spawn("agent command is empty".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(
            cmd,
            Some(context.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| CollaboratorError::Spawn(format!("{err:#}")))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "agent timed out");
            return Err(CollaboratorError::Timeout(self.timeout));
        }
        if !output.status.success() {
            return Err(CollaboratorError::Exit {
                code: output.status.code(),
                stderr: output.stderr_lossy().trim().to_string(),
            });
        }

        let response = output.stdout_lossy().trim().to_string();
        if response.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        debug!(bytes = response.len(), "agent responded");
        Ok(response)
    }
}
