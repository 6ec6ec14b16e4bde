//! Diagnostic tracing for rigour.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, written to stderr.
//!   Never part of command output, so `rigour check --json` stays parseable.
//!
//! - **Artifacts (`io/artifacts`, `io/history`)**: the report, fix packet and
//!   score history. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. `verbose` raises the default to
/// `rigour=debug` when `RUST_LOG` is unset.
///
/// # Example
/// ```bash
/// RUST_LOG=rigour=debug rigour check
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "rigour=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
