//! Tracing setup
//!
//! `RUST_LOG` drives the filter; the default is `info`. Payloads, personal
//! data and key material are never passed to tracing macros anywhere in the
//! core, so either output format is safe to ship off-host.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{HealthError, HealthResult};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber
///
/// Fails with [`HealthError::Internal`] if a subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> HealthResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    result.map_err(|e| HealthError::Internal(format!("tracing init failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        // Another test in this binary may already have installed a subscriber.
        let _ = init_tracing(LogFormat::Text);
        let err = init_tracing(LogFormat::Json).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
