//! Prompt rendering for the planner, coder and reviewer roles.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const CODER_TEMPLATE: &str = include_str!("prompts/coder.md");
const REVIEWER_TEMPLATE: &str = include_str!("prompts/reviewer.md");

/// Template engine wrapper around minijinja.
#[derive(Debug)]
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("coder", CODER_TEMPLATE)
            .expect("coder template should be valid");
        env.add_template("reviewer", REVIEWER_TEMPLATE)
            .expect("reviewer template should be valid");
        Self { env }
    }

    pub fn planner(&self, task: &str, research: Option<&str>) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            task => task.trim(),
            research => non_blank(research),
        })?;
        debug!(bytes = rendered.len(), "rendered planner prompt");
        Ok(rendered)
    }

    pub fn coder(
        &self,
        step: &str,
        feedback: Option<&str>,
        research: Option<&str>,
    ) -> Result<String> {
        let template = self.env.get_template("coder")?;
        let rendered = template.render(context! {
            step => step.trim(),
            feedback => non_blank(feedback),
            research => non_blank(research),
        })?;
        debug!(bytes = rendered.len(), "rendered coder prompt");
        Ok(rendered)
    }

    pub fn reviewer(&self, step: &str, code: &str, research: Option<&str>) -> Result<String> {
        let template = self.env.get_template("reviewer")?;
        let rendered = template.render(context! {
            step => step.trim(),
            code => code,
            research => non_blank(research),
        })?;
        debug!(bytes = rendered.len(), "rendered reviewer prompt");
        Ok(rendered)
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_prompt_includes_task_and_optional_research() {
        let prompts = PromptBuilder::new();
        let bare = prompts.planner("build a todo app", None).expect("render");
        assert!(bare.contains("build a todo app"));
        assert!(bare.contains("numbered list"));
        assert!(!bare.contains("## Research"));

        let researched = prompts
            .planner("build a todo app", Some("<Document href=\"u\">x</Document>"))
            .expect("render");
        assert!(researched.contains("## Research"));
        assert!(researched.contains("<Document href=\"u\">"));
    }

    #[test]
    fn coder_prompt_mentions_feedback_only_on_revision() {
        let prompts = PromptBuilder::new();
        let first = prompts.coder("write hello.py", None, None).expect("render");
        assert!(first.contains("write hello.py"));
        assert!(!first.contains("Reviewer feedback"));

        let revision = prompts
            .coder("write hello.py", Some("missing newline"), None)
            .expect("render");
        assert!(revision.contains("## Reviewer feedback"));
        assert!(revision.contains("missing newline"));
        assert!(revision.contains("MUST fix"));
    }

    #[test]
    fn blank_feedback_is_treated_as_none() {
        let prompts = PromptBuilder::new();
        let rendered = prompts.coder("ls", Some("   "), Some("  ")).expect("render");
        assert!(!rendered.contains("Reviewer feedback"));
        assert!(!rendered.contains("## Research"));
    }

    #[test]
    fn reviewer_prompt_fences_code() {
        let prompts = PromptBuilder::new();
        let rendered = prompts
            .reviewer("write hello.py", "print('Hello')", None)
            .expect("render");
        assert!(rendered.contains("```\nprint('Hello')\n```"));
        assert!(rendered.contains("APPROVED"));
        assert!(!rendered.contains("## Research"));
    }

    #[test]
    fn coder_and_reviewer_prompts_carry_research() {
        let prompts = PromptBuilder::new();
        let docs = "<Document href=\"u\">\nuse pathlib\n</Document>";
        let coder = prompts
            .coder("write hello.py", None, Some(docs))
            .expect("render");
        let reviewer = prompts
            .reviewer("write hello.py", "print('Hello')", Some(docs))
            .expect("render");
        for rendered in [coder, reviewer] {
            assert!(rendered.contains("## Research"));
            assert!(rendered.contains("use pathlib"));
        }
    }
}
