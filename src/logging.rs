//! Logging setup for the provider binary.
//!
//! All logs go to **stderr**; stdout carries only the plugin handshake line.
//! `RUST_LOG` controls filtering, e.g.
//!
//! ```bash
//! RUST_LOG=hemmer_provider_azurerm=debug hemmer-provider-azurerm
//! ```
//!
//! HTTP request lines are emitted at `debug` by [`crate::azure::client`];
//! the transport crates underneath are held at `warn` unless `RUST_LOG`
//! names them explicitly.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directives applied when `RUST_LOG` is not set.
const QUIET_DEPENDENCIES: &[&str] = &["h2=warn", "hyper=warn", "hyper_util=warn", "rustls=warn"];

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        QUIET_DEPENDENCIES
            .iter()
            .filter_map(|directive| directive.parse().ok())
            .fold(EnvFilter::new(default_level), |filter, directive| {
                filter.add_directive(directive)
            })
    })
}

/// Install the stderr subscriber at `info`.
///
/// Returns `false` when a global subscriber is already installed, which
/// happens when tests share a process.
pub fn init_logging() -> bool {
    init_logging_with_default("info")
}

/// Install the stderr subscriber with a custom default level.
pub fn init_logging_with_default(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}
