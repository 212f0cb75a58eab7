use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber.
///
/// An explicit `level` replaces `RUST_LOG`; without either the editor logs at
/// `info`.
pub(crate) fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = filter_for(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .try_init()
        .map_err(anyhow::Error::msg)
        .context("failed to install tracing subscriber")
}

fn filter_for(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter `{level}`")),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}
