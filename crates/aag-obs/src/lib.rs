//! Logging setup shared by the capture and serve CLI subcommands.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a `tracing` subscriber honoring `RUST_LOG`, falling back to
/// `"info,aag=debug"` when `verbose`, else plain `"info"`.
pub fn init(verbose: bool) {
    let default_filter = if verbose { "info,aag=debug" } else { "info" };
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("observability initialized");
}
