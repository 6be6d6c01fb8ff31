//! Cleanup of coder output before review and execution.

use std::sync::LazyLock;

use regex::Regex;

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z0-9]*\n").expect("leading fence regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```$").expect("trailing fence regex"));

/// Strip a markdown code fence around generated code.
///
/// The opening fence (optionally tagged with a language) and the closing fence
/// are removed independently; unfenced text only gets trimmed.
pub fn clean_code(raw: &str) -> String {
    let code = raw.trim();
    let code = LEADING_FENCE.replace(code, "");
    let code = TRAILING_FENCE.replace(&code, "");
    code.trim().to_string()
}
