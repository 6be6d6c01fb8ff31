//! Mapping of reviewer responses to a [`Verdict`].

use serde::{Deserialize, Serialize};

use crate::core::types::Verdict;

pub const APPROVAL_TOKEN: &str = "APPROVED";

/// How strictly a reviewer response must match the approval token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictMode {
    /// Approved when the token appears anywhere in the response.
    #[default]
    Substring,
    /// Approved only when the whole response is the token.
    Strict,
}

/// Map a raw reviewer response to a verdict.
///
/// Anything that is not an approval becomes `Rejected` carrying the full
/// response text as feedback.
pub fn parse_verdict(response: &str, mode: VerdictMode) -> Verdict {
    let approved = match mode {
        VerdictMode::Substring => response.to_uppercase().contains(APPROVAL_TOKEN),
        VerdictMode::Strict => {
            let normalized = response
                .trim()
                .trim_end_matches(['.', '!'])
                .trim_matches(|c| c == '*' || c == '"' || c == '`');
            normalized.eq_ignore_ascii_case(APPROVAL_TOKEN)
        }
    };
    if approved {
        Verdict::Approved
    } else {
        Verdict::Rejected(response.to_string())
    }
}
