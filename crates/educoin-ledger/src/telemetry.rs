//! Tracing subscriber bootstrap.

use educoin_types::{EducoinError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. With `json` set
/// every event is emitted as one JSON object per line.
///
/// # Errors
/// Returns `Configuration` if a global subscriber is already installed.
pub fn init(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EducoinError::Configuration(format!("tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        // Another test may have installed one first; either way the
        // second call must fail cleanly.
        let _ = init(false);
        let err = init(true).unwrap_err();
        assert!(matches!(err, EducoinError::Configuration(_)));
    }
}
