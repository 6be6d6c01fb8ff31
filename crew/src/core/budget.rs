//! Node-execution ceiling shared by the revision loop and the whole run.

use std::fmt;

/// Reason recorded when a run exhausts its node budget.
pub const STEP_LIMIT_EXCEEDED: &str = "step limit exceeded";

/// Returned by [`NodeBudget::charge`] once the ceiling is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLimitExceeded {
    pub limit: u32,
}

impl fmt::Display for StepLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{STEP_LIMIT_EXCEEDED} (limit {})", self.limit)
    }
}

impl std::error::Error for StepLimitExceeded {}

/// Counts collaborator invocations against a fixed ceiling.
///
/// `charge` is called before every invocation; the count never exceeds the
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBudget {
    limit: u32,
    used: u32,
}

impl NodeBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    /// Reserve one invocation, or fail if none remain.
    pub fn charge(&mut self) -> Result<u32, StepLimitExceeded> {
        if self.used >= self.limit {
            return Err(StepLimitExceeded { limit: self.limit });
        }
        self.used += 1;
        Ok(self.used)
    }
}
