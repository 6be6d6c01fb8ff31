//! Diagnostics on stderr.
//!
//! Tracing output is for whoever runs `crew`. The run record is separate:
//! `.crew/events/` is always written and does not depend on the log level.
//!
//! The level comes from `RUST_LOG` when set, otherwise from the `-v` count:
//!
//! ```bash
//! crew -v run "create hello.py printing Hello"    # info
//! crew -vv run "create hello.py printing Hello"   # debug
//! RUST_LOG=crew::io=trace crew run "..."          # per-module
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the stderr subscriber. Call once, before any work starts.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2)
                .compact(),
        )
        .init();
}
