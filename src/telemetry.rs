//! Process-wide log output.

use tracing_subscriber::EnvFilter;

use crate::error::BoxError;

/// Installs a JSON formatter on stdout. Verbosity comes from `RUST_LOG`,
/// `info` when unset or invalid.
pub fn init() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .try_init()
}
