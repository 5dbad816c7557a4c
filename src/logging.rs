//! Tracing subscriber setup for the `docfind` binary.
//!
//! Logs go to stderr so they never mix with search results on stdout.
//! `RUST_LOG` takes precedence; otherwise the level follows `--verbose`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// The filter used when `RUST_LOG` is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "docfind=debug"
    } else {
        "docfind=warn"
    }
}

/// Build the env filter, falling back to [`default_directive`].
pub fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Build the subscriber without installing it.
pub fn build_subscriber(verbose: bool) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(fmt_layer)
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call is ignored.
pub fn init(verbose: bool) {
    let _ = build_subscriber(verbose).try_init();
}
