//! Multi-role coding workflow engine.
//!
//! A run turns one task into a numbered plan, then walks the plan step by
//! step: steps that need code go through a coder/reviewer revision loop, and
//! every step ends in a gated shell command. The crate is split the same way
//! the run is:
//!
//! - **[`core`]**: Pure, deterministic logic (routing, parsing, verdicts, run
//!   state). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config, processes, event stores, agent and
//!   search backends).
//! - **[`agents`]**: Planner, coder and reviewer roles over a text generator.
//! - **[`engine`]**: The state machine that composes them into a run.

pub mod agents;
pub mod cancel;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
