//! Coder role: step and optional reviewer feedback in, raw code out.

use std::sync::Arc;

use tracing::instrument;

use super::{CodeGenerator, CollaboratorError, TextGenerator, research};
use crate::io::prompt::PromptBuilder;
use crate::io::search::{NoSearch, SearchTool};

pub struct CoderAgent {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchTool>,
    prompts: PromptBuilder,
}

impl CoderAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            search: Arc::new(NoSearch),
            prompts: PromptBuilder::new(),
        }
    }

    /// Look the step up before each attempt.
    pub fn with_search(mut self, search: Arc<dyn SearchTool>) -> Self {
        self.search = search;
        self
    }
}

impl CodeGenerator for CoderAgent {
    #[instrument(skip_all, fields(revision = feedback.is_some()))]
    fn generate_code(
        &self,
        step: &str,
        feedback: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let research = research(self.search.as_ref(), step);
        let prompt = self
            .prompts
            .coder(step, feedback, research.as_deref())
            .map_err(|err| CollaboratorError::Prompt(format!("{err:#}")))?;
        self.generator.generate(&prompt)
    }
}
