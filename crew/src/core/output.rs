//! Bounded command output and its human-readable rendering.

use crate::core::types::{CommandResult, CommandStatus};

/// Appended to a stream that was cut at the output cap.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";
/// Stands in for an empty stdout.
pub const NO_OUTPUT: &str = "[No output]";
/// Stands in for an empty stderr.
pub const NO_STDERR: &str = "[No stderr]";

pub const REASON_EMPTY: &str = "empty command";
pub const REASON_MALFORMED: &str = "malformed command";
pub const REASON_NOT_ALLOWED: &str = "not a recognized or allowed command";

/// Keep the first `limit` characters of `text`, marking the cut.
///
/// Counts Unicode scalar values, so multi-byte text is never split mid-char.
/// `force_marker` adds the marker even when `text` fits, for streams that were
/// already cut upstream.
pub fn truncate_chars(text: &str, limit: usize, force_marker: bool) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None if force_marker => format!("{text}{TRUNCATION_MARKER}"),
        None => text.to_string(),
    }
}

impl CommandResult {
    /// Human-readable tool output, as shown to consumers.
    pub fn render(&self) -> String {
        match self.status {
            CommandStatus::Success => format!(
                "Command executed successfully.\n\nOutput:\n{}",
                or_marker(&self.stdout, NO_OUTPUT)
            ),
            CommandStatus::Failure => {
                let headline = match self.exit_code {
                    Some(code) => format!("Command failed with return code {code}."),
                    None => "Command was terminated by a signal.".to_string(),
                };
                format!(
                    "{headline}\n\nOutput:\n{}\n\nError:\n{}",
                    or_marker(&self.stdout, NO_OUTPUT),
                    or_marker(&self.stderr, NO_STDERR)
                )
            }
            CommandStatus::Timeout => {
                let reason = self.reason.as_deref().unwrap_or("command timed out");
                format!("Error: {reason}.")
            }
            CommandStatus::Rejected => {
                let reason = self.reason.as_deref().unwrap_or(REASON_NOT_ALLOWED);
                if reason == REASON_NOT_ALLOWED {
                    format!(
                        "Error: {reason}. If this is a plan step or description, pass it to the coder to produce the actual command."
                    )
                } else {
                    format!("Error: {reason}.")
                }
            }
        }
    }
}

fn or_marker<'a>(text: &'a str, marker: &'a str) -> &'a str {
    if text.is_empty() { marker } else { text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_exact_char_count_with_marker() {
        let text = "a".repeat(5000);
        let out = truncate_chars(&text, 3000, false);
        assert_eq!(out, format!("{}{}", "a".repeat(3000), TRUNCATION_MARKER));
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("hello", 3000, false), "hello");
    }

    #[test]
    fn exact_limit_is_not_marked() {
        let text = "b".repeat(3000);
        assert_eq!(truncate_chars(&text, 3000, false), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let out = truncate_chars(&text, 4, false);
        assert_eq!(out, format!("éééé{TRUNCATION_MARKER}"));
    }

    #[test]
    fn forced_marker_is_appended_when_upstream_cut() {
        assert_eq!(
            truncate_chars("abc", 10, true),
            format!("abc{TRUNCATION_MARKER}")
        );
    }

    #[test]
    fn render_failure_uses_markers_for_empty_streams() {
        let result = CommandResult {
            status: CommandStatus::Failure,
            exit_code: Some(2),
            stdout: String::new(),
            stderr: String::new(),
            reason: None,
        };
        let text = result.render();
        assert!(text.contains("return code 2"));
        assert!(text.contains(NO_OUTPUT));
        assert!(text.contains(NO_STDERR));
    }

    #[test]
    fn render_rejection_hints_at_coder() {
        let text = CommandResult::rejected(REASON_NOT_ALLOWED).render();
        assert!(text.starts_with("Error: not a recognized or allowed command."));
        assert!(text.contains("coder"));

        let empty = CommandResult::rejected(REASON_EMPTY).render();
        assert_eq!(empty, "Error: empty command.");
    }
}
