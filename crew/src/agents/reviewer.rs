//! Reviewer role: step and code in, raw review out.

use std::sync::Arc;

use tracing::instrument;

use super::{CollaboratorError, Reviewer, TextGenerator, research};
use crate::io::prompt::PromptBuilder;
use crate::io::search::{NoSearch, SearchTool};

pub struct ReviewerAgent {
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchTool>,
    prompts: PromptBuilder,
}

impl ReviewerAgent {
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

impl Reviewer for ReviewerAgent {
    #[instrument(skip_all)]
    fn review(&self, step: &str, code: &str) -> Result<String, CollaboratorError> {
        let research = research(self.search.as_ref(), step);
        let prompt = self
            .prompts
            .reviewer(step, code, research.as_deref())
            .map_err(|err| CollaboratorError::Prompt(format!("{err:#}")))?;
        self.generator.generate(&prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::search::NO_RESULTS;
    use crate::test_support::FixedSearch;
    use std::sync::Mutex;

    fn capturing() -> (Arc<Mutex<Option<String>>>, Arc<dyn TextGenerator>) {
        let seen = Arc::new(Mutex::new(None::<String>));
        let sink = Arc::clone(&seen);
        let generator = move |prompt: &str| -> Result<String, CollaboratorError> {
            *sink.lock().expect("lock") = Some(prompt.to_string());
            Ok("APPROVED".to_string())
        };
        (seen, Arc::new(generator))
    }

    #[test]
    fn prompt_includes_step_and_fenced_code() {
        let (seen, generator) = capturing();
        let reviewer = ReviewerAgent::new(generator);

        let raw = reviewer.review("write hello.py", "print('Hello')").expect("review");

        assert_eq!(raw, "APPROVED");
        let prompt = seen.lock().expect("lock").clone().expect("prompt");
        assert!(prompt.contains("write hello.py"));
        assert!(prompt.contains("```\nprint('Hello')\n```"));
        assert!(!prompt.contains("## Research"));
    }

    #[test]
    fn review_prompt_includes_step_research() {
        let (seen, generator) = capturing();
        let search = Arc::new(FixedSearch::new("<Document href=\"pep8\">\nstyle\n</Document>"));
        let reviewer = ReviewerAgent::new(generator).with_search(search.clone());

        reviewer.review("write hello.py", "print('Hello')").expect("review");

        assert_eq!(search.queries(), ["write hello.py"]);
        let prompt = seen.lock().expect("lock").clone().expect("prompt");
        assert!(prompt.contains("## Research"));
        assert!(prompt.contains("<Document href=\"pep8\">"));
    }

    #[test]
    fn empty_search_leaves_prompt_unchanged() {
        let (seen, generator) = capturing();
        let reviewer =
            ReviewerAgent::new(generator).with_search(Arc::new(FixedSearch::new(NO_RESULTS)));

        reviewer.review("ls", "ls -la").expect("review");

        let prompt = seen.lock().expect("lock").clone().expect("prompt");
        assert!(!prompt.contains("## Research"));
    }
}
