//! Scripted collaborators for engine tests.
//!
//! Each double records how it was called so tests can assert on the exact
//! sequence of collaborator invocations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use crate::agents::{CodeGenerator, CollaboratorError, PlanGenerator, Reviewer};
use crate::core::types::{CommandResult, CommandStatus, Event};
use crate::engine::Collaborators;
use crate::io::event_store::{EventSink, MemoryEventStore};
use crate::io::executor::CommandExecutor;
use crate::io::search::SearchTool;

/// Bundle collaborators with a fresh in-memory sink.
pub fn collaborators(
    planner: Arc<dyn PlanGenerator>,
    coder: Arc<dyn CodeGenerator>,
    reviewer: Arc<dyn Reviewer>,
    executor: Arc<dyn CommandExecutor>,
) -> Collaborators {
    Collaborators {
        planner,
        coder,
        reviewer,
        executor,
        sink: Arc::new(MemoryEventStore::new()),
    }
}

/// Queue of canned responses with an optional fallback once drained.
#[derive(Debug, Default)]
struct Script {
    queue: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl Script {
    fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    fn repeating(response: impl Into<String>) -> Self {
        Self {
            fallback: Some(response.into()),
            ..Self::default()
        }
    }

    fn failing(err: CollaboratorError) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from([Err(err)])),
            ..Self::default()
        }
    }

    fn next(&self) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.queue.lock().expect("script lock");
        match queue.pop_front() {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| CollaboratorError::Other("script exhausted".to_string())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ScriptedPlanner {
    script: Script,
    tasks: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    /// Return `raw_plan` on every call.
    pub fn new(raw_plan: &str) -> Self {
        Self {
            script: Script::repeating(raw_plan),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            script: Script::failing(err),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().expect("tasks lock").clone()
    }
}

impl PlanGenerator for ScriptedPlanner {
    fn generate_plan(&self, task: &str) -> Result<String, CollaboratorError> {
        self.tasks.lock().expect("tasks lock").push(task.to_string());
        self.script.next()
    }
}

#[derive(Debug)]
pub struct ScriptedCoder {
    script: Script,
    feedback: Mutex<Vec<Option<String>>>,
}

impl ScriptedCoder {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::new(responses),
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(response: &str) -> Self {
        Self {
            script: Script::repeating(response),
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    /// Feedback argument of each call, in order.
    pub fn feedback_seen(&self) -> Vec<Option<String>> {
        self.feedback.lock().expect("feedback lock").clone()
    }
}

impl CodeGenerator for ScriptedCoder {
    fn generate_code(
        &self,
        _step: &str,
        feedback: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        self.feedback
            .lock()
            .expect("feedback lock")
            .push(feedback.map(str::to_string));
        self.script.next()
    }
}

#[derive(Debug)]
pub struct ScriptedReviewer {
    script: Script,
    reviewed: Mutex<Vec<String>>,
}

impl ScriptedReviewer {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Script::new(responses),
            reviewed: Mutex::new(Vec::new()),
        }
    }

    pub fn approving() -> Self {
        Self::repeating("APPROVED")
    }

    /// Reviewer that never approves.
    pub fn rejecting(feedback: &str) -> Self {
        Self::repeating(feedback)
    }

    fn repeating(response: &str) -> Self {
        Self {
            script: Script::repeating(response),
            reviewed: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }

    /// Code passed to each review, in order.
    pub fn reviewed(&self) -> Vec<String> {
        self.reviewed.lock().expect("reviewed lock").clone()
    }
}

impl Reviewer for ScriptedReviewer {
    fn review(&self, _step: &str, code: &str) -> Result<String, CollaboratorError> {
        self.reviewed
            .lock()
            .expect("reviewed lock")
            .push(code.to_string());
        self.script.next()
    }
}

/// Executor returning canned results without spawning anything.
#[derive(Debug)]
pub struct ScriptedExecutor {
    results: Mutex<VecDeque<CommandResult>>,
    fallback: Option<CommandResult>,
    error: Option<String>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(results: impl IntoIterator<Item = CommandResult>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            fallback: None,
            error: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every command succeeds with `stdout`.
    pub fn success(stdout: &str) -> Self {
        Self {
            fallback: Some(CommandResult {
                status: CommandStatus::Success,
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
                reason: None,
            }),
            ..Self::empty()
        }
    }

    /// Every call fails as if the shell could not be spawned.
    pub fn broken(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::empty()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command_line: &str) -> Result<CommandResult> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command_line.to_string());
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        let mut results = self.results.lock().expect("results lock");
        results
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow!("no scripted result for {command_line:?}"))
    }
}

/// Sink that rejects every append.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl EventSink for FailingSink {
    fn append(&self, _run_id: &str, _event: &Event) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("disk full"))
    }
}

/// Search tool that answers every query with the same text.
#[derive(Debug)]
pub struct FixedSearch {
    results: String,
    queries: Mutex<Vec<String>>,
}

impl FixedSearch {
    pub fn new(results: impl Into<String>) -> Self {
        Self {
            results: results.into(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl SearchTool for FixedSearch {
    fn search(&self, query: &str) -> String {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        self.results.clone()
    }
}
