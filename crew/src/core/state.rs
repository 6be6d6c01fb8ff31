//! Run state and the deltas transitions produce.
//!
//! Transition functions read a `&RunState` and return a [`StateDelta`]; only
//! the engine applies deltas, so a run has exactly one writer.

use anyhow::{Result, anyhow};

use crate::core::budget::{NodeBudget, StepLimitExceeded};
use crate::core::types::Plan;

/// Complete mutable context of one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub task: String,
    pub plan: Option<Plan>,
    pub step_index: usize,
    pub generated_code: Option<String>,
    pub feedback: Option<String>,
    budget: NodeBudget,
}

impl RunState {
    pub fn new(task: impl Into<String>, max_node_executions: u32) -> Self {
        Self {
            task: task.into(),
            plan: None,
            step_index: 0,
            generated_code: None,
            feedback: None,
            budget: NodeBudget::new(max_node_executions),
        }
    }

    pub fn node_exec_count(&self) -> u32 {
        self.budget.used()
    }

    pub fn node_exec_limit(&self) -> u32 {
        self.budget.limit()
    }

    /// Count one collaborator invocation against the ceiling.
    pub fn charge_node(&mut self) -> Result<u32, StepLimitExceeded> {
        self.budget.charge()
    }

    pub fn plan_len(&self) -> usize {
        self.plan.as_ref().map_or(0, Plan::len)
    }

    /// Step at the current index, if the plan has one.
    pub fn current_step(&self) -> Option<&str> {
        self.plan.as_ref()?.get(self.step_index)
    }

    /// True once every step has been executed.
    pub fn is_complete(&self) -> bool {
        self.plan.is_some() && self.step_index >= self.plan_len()
    }

    /// Merge a delta, rejecting results that break `step_index <= len(plan)`.
    pub fn apply(&mut self, delta: StateDelta) -> Result<()> {
        if self.plan.is_some() && delta.plan.is_some() {
            return Err(anyhow!("plan is fixed once created"));
        }
        let plan_len = delta
            .plan
            .as_ref()
            .map_or_else(|| self.plan_len(), Plan::len);
        let step_index = delta.step_index.unwrap_or(self.step_index);
        if step_index > plan_len {
            return Err(anyhow!(
                "step index {step_index} out of range for plan of {plan_len} steps"
            ));
        }

        if let Some(plan) = delta.plan {
            self.plan = Some(plan);
        }
        self.step_index = step_index;
        if let Some(code) = delta.generated_code {
            self.generated_code = code;
        }
        if let Some(feedback) = delta.feedback {
            self.feedback = feedback;
        }
        Ok(())
    }
}

/// Partial update to a [`RunState`]. `None` leaves a field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub plan: Option<Plan>,
    pub step_index: Option<usize>,
    pub generated_code: Option<Option<String>>,
    pub feedback: Option<Option<String>>,
}

impl StateDelta {
    pub fn plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            step_index: Some(0),
            ..Self::default()
        }
    }

    /// New code replaces any previous code and consumes pending feedback.
    pub fn code(code: String) -> Self {
        Self {
            generated_code: Some(Some(code)),
            feedback: Some(None),
            ..Self::default()
        }
    }

    pub fn feedback(feedback: String) -> Self {
        Self {
            feedback: Some(Some(feedback)),
            ..Self::default()
        }
    }

    /// Move to `next_index` with a clean per-step slate.
    pub fn advance(next_index: usize) -> Self {
        Self {
            step_index: Some(next_index),
            generated_code: Some(None),
            feedback: Some(None),
            ..Self::default()
        }
    }
}
