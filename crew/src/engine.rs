//! The workflow state machine.
//!
//! A [`WorkflowEngine`] is built once with its collaborators and shared by
//! any number of runs. [`WorkflowEngine::run`] returns a [`Run`], a lazy event
//! sequence: each call to `next` performs at most one transition and yields
//! the events it produced. The last event of every run is terminal, a
//! `system` event on success or an `error` event on failure.
//!
//! ```text
//! Planning -> RouteStep -> (Coding <-> Reviewing) -> Executing -> AdvanceIndex -> RouteStep ...
//!                 |                                                                  |
//!                 +----> Done <------------------------------------------------------+
//! ```

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use serde_json::json;
use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::agents::{CodeGenerator, CollaboratorError, PlanGenerator, Reviewer};
use crate::cancel::CancelToken;
use crate::core::budget::STEP_LIMIT_EXCEEDED;
use crate::core::code::clean_code;
use crate::core::plan::parse_plan;
use crate::core::router::TaskRouter;
use crate::core::state::{RunState, StateDelta};
use crate::core::types::{Event, EventKind, Role, RouteDecision, Verdict};
use crate::core::verdict::{VerdictMode, parse_verdict};
use crate::io::config::CrewConfig;
use crate::io::event_store::{EventSink, validate_run_id};
use crate::io::executor::CommandExecutor;

/// Reason recorded when a run observes its cancel token.
pub const CANCELLED: &str = "cancelled";

/// Injected collaborators. The engine never constructs these itself.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn PlanGenerator>,
    pub coder: Arc<dyn CodeGenerator>,
    pub reviewer: Arc<dyn Reviewer>,
    pub executor: Arc<dyn CommandExecutor>,
    pub sink: Arc<dyn EventSink>,
}

/// Tunables read once at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub router: TaskRouter,
    pub verdict_mode: VerdictMode,
    pub max_node_executions: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            router: TaskRouter::default(),
            verdict_mode: VerdictMode::default(),
            max_node_executions: 100,
        }
    }
}

impl EngineSettings {
    pub fn from_config(cfg: &CrewConfig) -> Self {
        Self {
            router: TaskRouter::new(&cfg.router.keywords),
            verdict_mode: cfg.reviewer.verdict,
            max_node_executions: cfg.workflow.max_node_executions,
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use this id instead of generating one. Must be file-name safe.
    pub run_id: Option<String>,
    pub cancel: CancelToken,
}

/// Generate a fresh `run-<hex>` id.
pub fn new_run_id() -> String {
    format!("run-{}", Uuid::new_v4().simple())
}

pub struct WorkflowEngine {
    collaborators: Collaborators,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(collaborators: Collaborators, settings: EngineSettings) -> Result<Self> {
        if settings.max_node_executions == 0 {
            return Err(anyhow!("max_node_executions must be > 0"));
        }
        Ok(Self {
            collaborators,
            settings,
        })
    }

    /// Start a run. Nothing is invoked until the returned sequence is polled.
    pub fn run(&self, task: &str, options: RunOptions) -> Result<Run<'_>> {
        let run_id = match options.run_id {
            Some(id) => {
                validate_run_id(&id)?;
                id
            }
            None => new_run_id(),
        };
        let span = info_span!("run", run_id = %run_id);
        span.in_scope(|| info!(task = %task, "run started"));
        Ok(Run {
            engine: self,
            run_id,
            cancel: options.cancel,
            state: RunState::new(task, self.settings.max_node_executions),
            stage: Stage::Planning,
            status: RunStatus::Running,
            pending: VecDeque::new(),
            revisions: 0,
            events_emitted: 0,
            sink_failures: 0,
            span,
        })
    }
}

/// Position of a run in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    RouteStep,
    Coding,
    Reviewing,
    Executing,
    AdvanceIndex,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

/// Observable outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Done,
    Failed(String),
}

/// Final report returned by [`Run::finish`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub state: RunState,
    pub events_emitted: usize,
    pub sink_failures: usize,
}

/// One in-progress workflow execution.
///
/// Iterating drives the run; the sequence is finite and fused.
pub struct Run<'a> {
    engine: &'a WorkflowEngine,
    run_id: String,
    cancel: CancelToken,
    state: RunState,
    stage: Stage,
    status: RunStatus,
    pending: VecDeque<Event>,
    revisions: u32,
    events_emitted: usize,
    sink_failures: usize,
    span: Span,
}

impl Run<'_> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Appends the sink rejected. Those events were still yielded.
    pub fn sink_failures(&self) -> usize {
        self.sink_failures
    }

    /// Drive the run to its terminal state and report.
    pub fn finish(mut self) -> RunSummary {
        for _ in self.by_ref() {}
        RunSummary {
            run_id: self.run_id,
            status: self.status,
            state: self.state,
            events_emitted: self.events_emitted,
            sink_failures: self.sink_failures,
        }
    }

    fn transition(&mut self) {
        if self.cancel.is_cancelled() {
            info!(stage = ?self.stage, "cancel observed");
            self.fail(CANCELLED.to_string());
            return;
        }
        let outcome = match self.stage {
            Stage::Planning => self.plan(),
            Stage::RouteStep => self.route_step(),
            Stage::Coding => self.code(),
            Stage::Reviewing => self.review(),
            Stage::Executing => self.execute(),
            Stage::AdvanceIndex => self.advance_index(),
            Stage::Done | Stage::Failed => return,
        };
        match outcome {
            Ok(Stage::Done) => self.complete(),
            Ok(next) => {
                debug!(from = ?self.stage, to = ?next, "transition");
                self.stage = next;
            }
            Err(reason) => self.fail(reason),
        }
    }

    fn plan(&mut self) -> Result<Stage, String> {
        self.charge()?;
        let raw = self
            .engine
            .collaborators
            .planner
            .generate_plan(&self.state.task)
            .map_err(|err| collaborator_failure(Role::Planner, &err))?;
        let plan = parse_plan(&raw);
        info!(steps = plan.len(), "plan created");

        let content = if plan.is_empty() {
            "No steps planned.".to_string()
        } else {
            plan.numbered()
        };
        let event = Event::new(0, Role::Planner, EventKind::Plan, content)
            .with_metadata(json!({ "steps": plan.steps() }));
        self.apply(StateDelta::plan(plan))?;
        self.emit(event);
        Ok(Stage::RouteStep)
    }

    fn route_step(&mut self) -> Result<Stage, String> {
        let index = self.state.step_index;
        let Some(step) = self.state.current_step() else {
            return Ok(Stage::Done);
        };
        let decision = self.engine.settings.router.classify(step);
        let (target, next) = match decision {
            RouteDecision::NeedsCode => ("coder", Stage::Coding),
            RouteDecision::DirectCommand => ("executor", Stage::Executing),
        };
        let event = Event::new(
            index,
            Role::System,
            EventKind::System,
            format!(
                "Step {}/{}: {} -> {}",
                index + 1,
                self.state.plan_len(),
                step,
                target
            ),
        )
        .with_metadata(json!({ "route": decision, "step": step }));
        let delta = match decision {
            RouteDecision::DirectCommand => StateDelta::code(step.to_string()),
            RouteDecision::NeedsCode => StateDelta::default(),
        };
        debug!(index, ?decision, "step routed");
        self.apply(delta)?;
        self.emit(event);
        Ok(next)
    }

    fn code(&mut self) -> Result<Stage, String> {
        let step = self.require_step()?;
        self.charge()?;
        let raw = self
            .engine
            .collaborators
            .coder
            .generate_code(&step, self.state.feedback.as_deref())
            .map_err(|err| collaborator_failure(Role::Coder, &err))?;
        let code = clean_code(&raw);
        self.revisions += 1;

        let event = Event::new(
            self.state.step_index,
            Role::Coder,
            EventKind::Code,
            code.clone(),
        )
        .with_metadata(json!({ "attempt": self.revisions }));
        self.apply(StateDelta::code(code))?;
        self.emit(event);
        Ok(Stage::Reviewing)
    }

    fn review(&mut self) -> Result<Stage, String> {
        let step = self.require_step()?;
        let code = self.state.generated_code.clone().unwrap_or_default();
        self.charge()?;
        let raw = self
            .engine
            .collaborators
            .reviewer
            .review(&step, &code)
            .map_err(|err| collaborator_failure(Role::Reviewer, &err))?;
        let verdict = parse_verdict(&raw, self.engine.settings.verdict_mode);

        let event = Event::new(
            self.state.step_index,
            Role::Reviewer,
            EventKind::Review,
            raw.trim(),
        )
        .with_metadata(json!(verdict));
        let next = match verdict {
            Verdict::Approved => {
                info!(attempts = self.revisions, "code approved");
                Stage::Executing
            }
            Verdict::Rejected(feedback) => {
                debug!(attempts = self.revisions, "code rejected");
                self.apply(StateDelta::feedback(feedback))?;
                Stage::Coding
            }
        };
        self.emit(event);
        Ok(next)
    }

    fn execute(&mut self) -> Result<Stage, String> {
        let command = self.state.generated_code.clone().unwrap_or_default();
        self.charge()?;
        let result = self
            .engine
            .collaborators
            .executor
            .execute(&command)
            .map_err(|err| format!("executor failed: {err:#}"))?;
        info!(status = ?result.status, exit_code = ?result.exit_code, "step executed");

        let mut event = Event::new(
            self.state.step_index,
            Role::Operator,
            EventKind::ToolOutput,
            result.render(),
        );
        event.metadata = serde_json::to_value(&result).ok();
        self.emit(event);
        Ok(Stage::AdvanceIndex)
    }

    fn advance_index(&mut self) -> Result<Stage, String> {
        self.apply(StateDelta::advance(self.state.step_index + 1))?;
        self.revisions = 0;
        Ok(Stage::RouteStep)
    }

    fn complete(&mut self) {
        info!(
            steps = self.state.plan_len(),
            node_executions = self.state.node_exec_count(),
            "run complete"
        );
        let event = Event::new(
            self.state.step_index,
            Role::System,
            EventKind::System,
            format!(
                "Workflow complete: {} step(s) executed.",
                self.state.plan_len()
            ),
        )
        .with_metadata(json!({
            "status": "done",
            "node_executions": self.state.node_exec_count(),
        }));
        self.stage = Stage::Done;
        self.status = RunStatus::Done;
        self.emit(event);
    }

    fn fail(&mut self, reason: String) {
        warn!(stage = ?self.stage, reason = %reason, "run failed");
        let event = Event::new(
            self.state.step_index,
            Role::System,
            EventKind::Error,
            reason.clone(),
        )
        .with_metadata(json!({
            "status": "failed",
            "stage": format!("{:?}", self.stage),
            "node_executions": self.state.node_exec_count(),
        }));
        self.stage = Stage::Failed;
        self.status = RunStatus::Failed(reason);
        self.emit(event);
    }

    fn charge(&mut self) -> Result<(), String> {
        match self.state.charge_node() {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(limit = err.limit, "node budget exhausted");
                Err(STEP_LIMIT_EXCEEDED.to_string())
            }
        }
    }

    fn require_step(&self) -> Result<String, String> {
        self.state
            .current_step()
            .map(str::to_string)
            .ok_or_else(|| format!("no step at index {}", self.state.step_index))
    }

    fn apply(&mut self, delta: StateDelta) -> Result<(), String> {
        self.state
            .apply(delta)
            .map_err(|err| format!("invalid state transition: {err:#}"))
    }

    fn emit(&mut self, event: Event) {
        if let Err(err) = self.engine.collaborators.sink.append(&self.run_id, &event) {
            self.sink_failures += 1;
            warn!(
                err = %format!("{err:#}"),
                kind = event.kind.as_str(),
                failures = self.sink_failures,
                "event sink append failed"
            );
        }
        self.events_emitted += 1;
        self.pending.push_back(event);
    }
}

impl Iterator for Run<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let span = self.span.clone();
        let _entered = span.enter();
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.stage.is_terminal() {
                return None;
            }
            self.transition();
        }
    }
}

impl FusedIterator for Run<'_> {}

fn collaborator_failure(role: Role, err: &CollaboratorError) -> String {
    format!("{} failed: {err}", role.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CommandResult, CommandStatus};
    use crate::io::event_store::{EventHistory, MemoryEventStore};
    use crate::test_support::{
        ScriptedCoder, ScriptedExecutor, ScriptedPlanner, ScriptedReviewer, collaborators,
    };

    fn engine_with(collaborators: Collaborators, max: u32) -> WorkflowEngine {
        WorkflowEngine::new(
            collaborators,
            EngineSettings {
                max_node_executions: max,
                ..EngineSettings::default()
            },
        )
        .expect("engine")
    }

    fn kinds(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(|e| e.kind.as_str()).collect()
    }

    #[test]
    fn direct_commands_skip_the_coder() {
        let coder = Arc::new(ScriptedCoder::new(Vec::<&str>::new()));
        let mut parts = collaborators(
            Arc::new(ScriptedPlanner::new("1. mkdir demo\n2. ls")),
            coder.clone(),
            Arc::new(ScriptedReviewer::approving()),
            Arc::new(ScriptedExecutor::success("ok")),
        );
        let store = Arc::new(MemoryEventStore::new());
        parts.sink = store.clone();
        let engine = engine_with(parts, 100);

        let mut run = engine.run("make a dir", RunOptions::default()).expect("run");
        let events: Vec<Event> = run.by_ref().collect();

        assert_eq!(
            kinds(&events),
            ["plan", "system", "tool_output", "system", "tool_output", "system"]
        );
        assert_eq!(run.status(), &RunStatus::Done);
        assert_eq!(run.stage(), Stage::Done);
        assert_eq!(run.sink_failures(), 0);
        assert_eq!(run.state().step_index, 2);
        assert_eq!(run.state().node_exec_count(), 3);
        assert_eq!(coder.calls(), 0);
        let stored = store.history(run.run_id()).expect("history");
        assert_eq!(stored.len(), events.len());
    }

    #[test]
    fn rejection_feeds_back_into_next_coding_attempt() {
        let coder = Arc::new(ScriptedCoder::new(["print('hi')", "print('Hello')"]));
        let reviewer = Arc::new(ScriptedReviewer::new(["Print Hello, not hi.", "APPROVED"]));
        let executor = Arc::new(ScriptedExecutor::success("Hello"));
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("1. Write a python script hello.py")),
                coder.clone(),
                reviewer.clone(),
                executor.clone(),
            ),
            100,
        );

        let summary = engine
            .run("hello", RunOptions::default())
            .expect("run")
            .finish();

        assert_eq!(summary.status, RunStatus::Done);
        assert_eq!(
            coder.feedback_seen(),
            [None, Some("Print Hello, not hi.".to_string())]
        );
        assert_eq!(executor.commands(), ["print('Hello')"]);
        assert_eq!(summary.state.generated_code, None);
        assert_eq!(summary.state.feedback, None);
    }

    #[test]
    fn ceiling_is_checked_before_each_call() {
        let reviewer = Arc::new(ScriptedReviewer::rejecting("no"));
        let coder = Arc::new(ScriptedCoder::repeating("x = 1"));
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("1. write code")),
                coder.clone(),
                reviewer.clone(),
                Arc::new(ScriptedExecutor::success("ok")),
            ),
            6,
        );

        let mut run = engine.run("loop", RunOptions::default()).expect("run");
        let events: Vec<Event> = run.by_ref().collect();

        assert_eq!(
            run.status(),
            &RunStatus::Failed(STEP_LIMIT_EXCEEDED.to_string())
        );
        assert_eq!(run.state().node_exec_count(), 6);
        assert_eq!(coder.calls() + reviewer.calls() + 1, 6);
        let last = events.last().expect("terminal event");
        assert_eq!(last.kind, EventKind::Error);
        assert_eq!(last.content, STEP_LIMIT_EXCEEDED);
    }

    #[test]
    fn executor_outcomes_never_abort_the_run() {
        let executor = Arc::new(ScriptedExecutor::new([
            CommandResult::rejected("not a recognized or allowed command"),
            CommandResult {
                status: CommandStatus::Failure,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "boom".to_string(),
                reason: None,
            },
        ]));
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("1. cd somewhere\n2. cat missing")),
                Arc::new(ScriptedCoder::new(Vec::<&str>::new())),
                Arc::new(ScriptedReviewer::approving()),
                executor,
            ),
            100,
        );

        let events: Vec<Event> = engine
            .run("t", RunOptions::default())
            .expect("run")
            .collect();

        let tool: Vec<&Event> = events
            .iter()
            .filter(|e| e.kind == EventKind::ToolOutput)
            .collect();
        assert_eq!(tool.len(), 2);
        assert_eq!(
            tool[0].metadata.as_ref().and_then(|m| m["status"].as_str()),
            Some("rejected")
        );
        assert!(tool[1].content.contains("return code 1"));
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::System));
    }

    #[test]
    fn executor_error_fails_the_run() {
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("1. ls")),
                Arc::new(ScriptedCoder::new(Vec::<&str>::new())),
                Arc::new(ScriptedReviewer::approving()),
                Arc::new(ScriptedExecutor::broken("sh missing")),
            ),
            100,
        );
        let summary = engine.run("t", RunOptions::default()).expect("run").finish();
        match summary.status {
            RunStatus::Failed(reason) => assert!(reason.starts_with("executor failed:")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn cancel_between_steps_stops_before_next_call() {
        let executor = Arc::new(ScriptedExecutor::success("ok"));
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("1. ls\n2. pwd")),
                Arc::new(ScriptedCoder::new(Vec::<&str>::new())),
                Arc::new(ScriptedReviewer::approving()),
                executor.clone(),
            ),
            100,
        );
        let cancel = CancelToken::new();
        let mut run = engine
            .run(
                "t",
                RunOptions {
                    cancel: cancel.clone(),
                    ..RunOptions::default()
                },
            )
            .expect("run");

        for event in run.by_ref() {
            if event.kind == EventKind::ToolOutput {
                cancel.cancel();
            }
        }

        assert_eq!(run.status(), &RunStatus::Failed(CANCELLED.to_string()));
        assert_eq!(run.stage(), Stage::Failed);
        assert_eq!(executor.commands(), ["ls"]);
        assert!(run.next().is_none());
    }

    #[test]
    fn rejects_unsafe_run_id() {
        let engine = engine_with(
            collaborators(
                Arc::new(ScriptedPlanner::new("")),
                Arc::new(ScriptedCoder::new(Vec::<&str>::new())),
                Arc::new(ScriptedReviewer::approving()),
                Arc::new(ScriptedExecutor::success("ok")),
            ),
            100,
        );
        let options = RunOptions {
            run_id: Some("../x".to_string()),
            ..RunOptions::default()
        };
        assert!(engine.run("t", options).is_err());
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let parts = collaborators(
            Arc::new(ScriptedPlanner::new("")),
            Arc::new(ScriptedCoder::new(Vec::<&str>::new())),
            Arc::new(ScriptedReviewer::approving()),
            Arc::new(ScriptedExecutor::success("ok")),
        );
        let settings = EngineSettings {
            max_node_executions: 0,
            ..EngineSettings::default()
        };
        assert!(WorkflowEngine::new(parts, settings).is_err());
    }

    #[test]
    fn generated_run_ids_are_unique_and_safe() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
        assert!(a.starts_with("run-"));
        assert_eq!(a.len(), 4 + 32);
        validate_run_id(&a).expect("valid");
    }
}
