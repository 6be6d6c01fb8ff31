//! Deterministic classification of plan steps.

use crate::core::types::RouteDecision;

/// Keywords that mark a step as needing the coder.
pub const DEFAULT_CODING_KEYWORDS: [&str; 6] = [
    "write",
    "create a file",
    "python script",
    "code",
    "implement",
    "add content",
];

/// Classifies steps into `NeedsCode` vs `DirectCommand`.
///
/// - `NeedsCode` if the lowercased step contains any keyword.
/// - `DirectCommand` otherwise, including for empty steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRouter {
    keywords: Vec<String>,
}

impl TaskRouter {
    /// Keywords are lowercased; blank entries are dropped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn classify(&self, step: &str) -> RouteDecision {
        let step = step.to_lowercase();
        if self.keywords.iter().any(|k| step.contains(k.as_str())) {
            RouteDecision::NeedsCode
        } else {
            RouteDecision::DirectCommand
        }
    }
}

impl Default for TaskRouter {
    fn default() -> Self {
        Self::new(DEFAULT_CODING_KEYWORDS)
    }
}
