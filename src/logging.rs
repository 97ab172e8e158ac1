//! Diagnostic tracing to stderr.
//!
//! Tracing is for developers; user-facing progress goes to stdout through the
//! CLI, and the run's audit trail goes to the session directory. Neither is
//! affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,wrangler_workflow=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
///
/// ```bash
/// RUST_LOG=wrangler_workflow=debug wrangler-workflow run spec.md
/// ```
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
