//! Parsing of planner output into a [`Plan`].

use tracing::debug;

use crate::core::types::Plan;

/// Parse a numbered list (`"N. content"`) into plan steps.
///
/// Each line is split on its first `.` and the trimmed remainder becomes a
/// step. Lines without a `.`, or with nothing after it, are skipped. An empty
/// result is a valid empty plan.
pub fn parse_plan(raw: &str) -> Plan {
    let mut steps = Vec::new();
    for (lineno, line) in raw.trim().lines().enumerate() {
        let Some((_, rest)) = line.split_once('.') else {
            debug!(lineno = lineno + 1, "skipping plan line without '.'");
            continue;
        };
        let step = rest.trim();
        if step.is_empty() {
            debug!(lineno = lineno + 1, "skipping empty plan step");
            continue;
        }
        steps.push(step.to_string());
    }
    Plan::new(steps)
}
