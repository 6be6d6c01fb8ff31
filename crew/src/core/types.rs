//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between the engine, its collaborators
//! and event consumers. They carry no I/O and serialize to stable JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One atomic unit of a plan.
pub type Step = String;

/// Ordered, index-addressed list of steps. Fixed once created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(String::as_str)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Render as the numbered list shown to humans (`1. first`).
    pub fn numbered(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Routing decision for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// The step describes work that must be written by the coder first.
    NeedsCode,
    /// The step is itself a command and goes straight to execution.
    DirectCommand,
}

/// Reviewer decision on generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "feedback", rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected(String),
}

/// Participant that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Planner,
    Coder,
    Reviewer,
    Operator,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Coder => "coder",
            Role::Reviewer => "reviewer",
            Role::Operator => "operator",
            Role::System => "system",
        }
    }
}

/// Kind of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Plan,
    Code,
    Review,
    ToolOutput,
    System,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Plan => "plan",
            EventKind::Code => "code",
            EventKind::Review => "review",
            EventKind::ToolOutput => "tool_output",
            EventKind::System => "system",
            EventKind::Error => "error",
        }
    }
}

/// One externally observable transition of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub step_index: usize,
    pub role: Role,
    pub kind: EventKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(step_index: usize, role: Role, kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            step_index,
            role,
            kind,
            content: content.into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Stream key consumers use to pick a renderer.
    pub fn node_name(&self) -> &'static str {
        match self.kind {
            EventKind::Plan => "plan",
            EventKind::Code => "code",
            EventKind::Review => "review",
            EventKind::ToolOutput => "execute_tool",
            EventKind::System => "system",
            EventKind::Error => "error",
        }
    }
}

/// Classification of a command execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Failure,
    Timeout,
    Rejected,
}

/// Outcome of a gated command execution.
///
/// `stdout` and `stderr` are already trimmed and truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub reason: Option<String>,
}

impl CommandResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Rejected,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_output_streams_as_execute_tool() {
        let event = Event::new(0, Role::Operator, EventKind::ToolOutput, "ok");
        assert_eq!(event.node_name(), "execute_tool");
        assert_eq!(event.kind.as_str(), "tool_output");
    }

    #[test]
    fn verdict_metadata_shape() {
        assert_eq!(json!(Verdict::Approved), json!({ "verdict": "approved" }));
        assert_eq!(
            json!(Verdict::Rejected("add a test".to_string())),
            json!({ "verdict": "rejected", "feedback": "add a test" })
        );
    }

    #[test]
    fn command_result_serializes_lowercase_status() {
        let value = json!(CommandResult::rejected("empty command"));
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["exit_code"], serde_json::Value::Null);
        assert_eq!(value["reason"], "empty command");
    }

    #[test]
    fn numbered_plan_is_one_based() {
        let plan = Plan::new(vec!["mkdir x".to_string(), "ls x".to_string()]);
        assert_eq!(plan.numbered(), "1. mkdir x\n2. ls x");
    }
}
