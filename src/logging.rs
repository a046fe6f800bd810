// Logging setup, powered by tracing-subscriber.
//
// The library only emits events; the binary installs the subscriber once.

use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when it is set and valid, else `level`.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level),
    }
}

/// Installs a compact stderr subscriber so stdout stays free for replies.
///
/// # Errors
/// Fails on an invalid level directive or if a global subscriber is
/// already installed.
pub fn init(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_env_filter(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .compact()
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_env_filter() {
        assert!(build_env_filter("debug").is_ok());
        assert!(build_env_filter("tsvdb=trace,warn").is_ok());
    }
}
