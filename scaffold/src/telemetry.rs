//! Tracing initialization.
//!
//! Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to the
//! given directive when the variable is unset or invalid.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG`, or from `default_directive` if unset.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize tracing for the process. Fails if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;

    tracing::debug!("Tracing initialized");
    Ok(())
}
