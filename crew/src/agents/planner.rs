//! Planner role: task in, raw numbered plan out.

use std::sync::Arc;

use tracing::instrument;

use super::{CollaboratorError, PlanGenerator, TextGenerator, research};
use crate::io::prompt::PromptBuilder;
use crate::io::search::{NoSearch, SearchTool};

/// Plans a task, optionally with search results folded into the prompt.
pub struct PlannerAgent {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchTool>,
    prompts: PromptBuilder,
}

impl PlannerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            search: Arc::new(NoSearch),
            prompts: PromptBuilder::new(),
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchTool>) -> Self {
        self.search = search;
        self
    }
}

impl PlanGenerator for PlannerAgent {
    #[instrument(skip_all)]
    fn generate_plan(&self, task: &str) -> Result<String, CollaboratorError> {
        let research = research(self.search.as_ref(), task);
        let prompt = self
            .prompts
            .planner(task, research.as_deref())
            .map_err(|err| CollaboratorError::Prompt(format!("{err:#}")))?;
        self.generator.generate(&prompt)
    }
}
