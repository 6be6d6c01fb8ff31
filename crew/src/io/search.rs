//! Research tool available to the planner.
//!
//! Search never fails from the caller's point of view: errors are folded into
//! the returned text so they can be shown to the model like any other result.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::io::config::SearchConfig;
use crate::io::process::run_command_with_timeout;

pub const NO_RESULTS: &str = "No search results found for that query.";

const SEARCH_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchDocument {
    pub url: String,
    pub content: String,
}

pub trait SearchTool: Send + Sync {
    /// Formatted documents, or [`NO_RESULTS`], or an error description.
    fn search(&self, query: &str) -> String;
}

/// Render documents as `<Document href="...">` blocks.
pub fn format_documents(docs: &[SearchDocument]) -> String {
    if docs.is_empty() {
        return NO_RESULTS.to_string();
    }
    docs.iter()
        .map(|doc| format!("<Document href=\"{}\">\n{}\n</Document>", doc.url, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Search disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

impl SearchTool for NoSearch {
    fn search(&self, _query: &str) -> String {
        NO_RESULTS.to_string()
    }
}

/// Runs a search CLI with the query as its last argument.
///
/// The command must print a JSON array of `{ "url", "content" }` objects.
#[derive(Debug, Clone)]
pub struct CommandSearch {
    command: Vec<String>,
    max_results: usize,
    timeout: Duration,
}

impl CommandSearch {
    /// `None` when no command is configured.
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        if config.command.is_empty() {
            return None;
        }
        Some(Self {
            command: config.command.clone(),
            max_results: config.max_results,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn fetch(&self, query: &str) -> Result<Vec<SearchDocument>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("search command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(query);
        let output = run_command_with_timeout(cmd, None, self.timeout, SEARCH_OUTPUT_LIMIT_BYTES)
            .context("run search command")?;
        if output.timed_out {
            return Err(anyhow!("search timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "search exited with status {:?}: {}",
                output.status.code(),
                output.stderr_lossy().trim()
            ));
        }
        let mut docs: Vec<SearchDocument> =
            serde_json::from_slice(&output.stdout).context("parse search results")?;
        docs.truncate(self.max_results);
        Ok(docs)
    }
}

impl SearchTool for CommandSearch {
    #[instrument(skip_all, fields(query = %query))]
    fn search(&self, query: &str) -> String {
        info!("performing search");
        match self.fetch(query) {
            Ok(docs) => format_documents(&docs),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "search failed");
                format!("An error occurred during web search: {err:#}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(url: &str, content: &str) -> SearchDocument {
        SearchDocument {
            url: url.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn formats_documents_with_separators() {
        let text = format_documents(&[doc("https://a", "alpha"), doc("https://b", "beta")]);
        assert_eq!(
            text,
            "<Document href=\"https://a\">\nalpha\n</Document>\n\n---\n\n<Document href=\"https://b\">\nbeta\n</Document>"
        );
    }

    #[test]
    fn empty_results_use_no_results_text() {
        assert_eq!(format_documents(&[]), NO_RESULTS);
        assert_eq!(NoSearch.search("anything"), NO_RESULTS);
    }

    #[test]
    fn disabled_when_no_command() {
        assert!(CommandSearch::from_config(&SearchConfig::default()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_search_parses_and_caps_results() {
        let config = SearchConfig {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"printf '[{"url":"u1","content":"c1"},{"url":"u2","content":"c2"}]'"#
                    .to_string(),
            ],
            max_results: 1,
            timeout_secs: 5,
        };
        let search = CommandSearch::from_config(&config).expect("configured");
        assert_eq!(search.search("rust"), "<Document href=\"u1\">\nc1\n</Document>");
    }

    #[cfg(unix)]
    #[test]
    fn command_errors_are_returned_as_text() {
        let config = SearchConfig {
            command: vec!["sh".to_string(), "-c".to_string(), "exit 4".to_string()],
            max_results: 3,
            timeout_secs: 5,
        };
        let search = CommandSearch::from_config(&config).expect("configured");
        let text = search.search("rust");
        assert!(text.starts_with("An error occurred during web search:"));
        assert!(text.contains("status Some(4)"));
    }
}
