//! Collaborator roles for planning, coding and review.
//!
//! Every role is a text-in/text-out function. The engine owns interpretation
//! of the text (plan parsing, fence stripping, verdict mapping), so these
//! traits return raw responses.

use std::time::Duration;

use tracing::debug;

use crate::io::search::{NO_RESULTS, SearchTool};

pub mod coder;
pub mod planner;
pub mod reviewer;

pub use coder::CoderAgent;
pub use planner::PlannerAgent;
pub use reviewer::ReviewerAgent;

/// Unrecoverable failure of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("failed to start agent: {0}")]
    Spawn(String),
    #[error("agent exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),
    #[error("agent returned an empty response")]
    EmptyResponse,
    #[error("failed to render prompt: {0}")]
    Prompt(String),
    #[error("{0}")]
    Other(String),
}

/// Generic model call: prompt in, response text out.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, context: &str) -> Result<String, CollaboratorError>;
}

/// Produces the raw numbered plan for a task.
pub trait PlanGenerator: Send + Sync {
    fn generate_plan(&self, task: &str) -> Result<String, CollaboratorError>;
}

/// Produces raw code or a command for one step.
pub trait CodeGenerator: Send + Sync {
    fn generate_code(&self, step: &str, feedback: Option<&str>)
    -> Result<String, CollaboratorError>;
}

/// Produces a raw review of generated code.
pub trait Reviewer: Send + Sync {
    fn review(&self, step: &str, code: &str) -> Result<String, CollaboratorError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&str) -> Result<String, CollaboratorError> + Send + Sync,
{
    fn generate(&self, context: &str) -> Result<String, CollaboratorError> {
        self(context)
    }
}

/// Search results worth putting in a prompt, if any.
pub(crate) fn research(search: &dyn SearchTool, query: &str) -> Option<String> {
    let results = search.search(query);
    if results.trim().is_empty() || results == NO_RESULTS {
        return None;
    }
    debug!(bytes = results.len(), "research attached");
    Some(results)
}
