//! Logging configuration using tracing
//!
//! Structured logging to stderr, filtered by the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Without RUST_LOG the filter is "warn", or "info" with `verbose`, so the
/// rate governor's pauses and unresolved documents are always visible.
///
/// # Example RUST_LOG values
/// - `RUST_LOG=ghmirror=debug` - Every GitHub request with its rate budget
/// - `RUST_LOG=ghmirror::store=trace` - Every stored key and store page
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init(verbose: bool) -> crate::Result<()> {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| crate::MirrorError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let _ = init(true);
        assert!(init(false).is_err());
    }
}
