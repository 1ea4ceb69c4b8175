//! Structured logging infrastructure
//!
//! Provides env_logger-based logging on the error stream. The output stream
//! belongs to the resource protocol, so nothing here may write to stdout.

use log::{debug, info, warn};
use std::sync::Once;
use std::time::Duration;

static INIT_LOGGER: Once = Once::new();

/// Logging bootstrap and domain log helpers
pub struct LoggingTransformer;

impl LoggingTransformer {
    /// Initialize logging system (should be called once at process startup)
    ///
    /// Configure logging levels via `RUST_LOG`; when unset, `info` is used so
    /// pipeline logs show checksums and certificate facts by default:
    /// - `RUST_LOG=debug` - Enable all debug logs
    /// - `RUST_LOG=certchain_store=debug,aws_config=warn` - Module-specific levels
    pub fn init() {
        INIT_LOGGER.call_once(|| {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Stderr)
                .format_timestamp_millis()
                .init();
        });
    }

    /// Initialize logging for test environments
    ///
    /// Use this in test modules to avoid initialization conflicts
    pub fn init_test() {
        let _ = env_logger::Builder::from_default_env()
            .is_test(true)
            .try_init();
    }

    /// Log the checksum of an artifact read from or written to the store
    pub fn log_artifact_checksum(description: &str, object_key: &str, checksum: &str) {
        info!("{description} checksum: {checksum} ({object_key})");
    }

    /// Log store operations
    pub fn log_store_operation(operation: &str, object_key: &str, success: bool) {
        if success {
            debug!("Store operation succeeded: {operation} {object_key}");
        } else {
            warn!("Store operation failed: {operation} {object_key}");
        }
    }

    /// Log the facts an operator needs from a certificate
    pub fn log_certificate_facts(
        description: &str,
        common_name: &str,
        time_until_expiration: Option<Duration>,
    ) {
        info!("{description} common name: {common_name}");
        match time_until_expiration {
            Some(remaining) => info!(
                "{description} time until expiration: {}",
                Self::format_duration(remaining)
            ),
            None => warn!("{description} has expired"),
        }
    }

    /// Log diagnostic text emitted by an external signing engine
    pub fn log_engine_diagnostic(engine: &str, stream: &str, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            info!("{engine} {stream}:\n{text}");
        }
    }

    /// Log performance metrics and timing information
    pub fn log_performance_metric(operation: &str, elapsed: Duration, success: bool) {
        if success {
            debug!("Performance: {operation} completed in {}ms", elapsed.as_millis());
        } else {
            warn!("Performance: {operation} failed after {}ms", elapsed.as_millis());
        }
    }

    /// `{days}d{hours}h{minutes}m`, the form used in resource metadata
    #[must_use]
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let days = secs / 86_400;
        let hours = (secs % 86_400) / 3_600;
        let minutes = (secs % 3_600) / 60;
        format!("{days}d{hours}h{minutes}m")
    }

    /// Shortened checksum for log lines
    ///
    /// Returns the first 12 characters prefixed with `#`.
    #[must_use]
    pub fn short_checksum(checksum: &str) -> String {
        let head: String = checksum.chars().take(12).collect();
        format!("#{head}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        let d = Duration::from_secs(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5);
        assert_eq!(LoggingTransformer::format_duration(d), "2d3h4m");
        assert_eq!(LoggingTransformer::format_duration(Duration::ZERO), "0d0h0m");
    }

    #[test]
    fn test_short_checksum() {
        assert_eq!(
            LoggingTransformer::short_checksum("0123456789abcdef0123"),
            "#0123456789ab"
        );
        assert_eq!(LoggingTransformer::short_checksum("abc"), "#abc");
    }

    #[test]
    fn test_short_checksum_counts_characters() {
        assert_eq!(
            LoggingTransformer::short_checksum("ééééééééééééé"),
            "#éééééééééééé"
        );
        assert_eq!(LoggingTransformer::short_checksum("0123456789aé"), "#0123456789aé");
    }

    #[test]
    fn test_logging_operations() {
        LoggingTransformer::init_test();

        // These should not panic and should produce log output
        LoggingTransformer::log_artifact_checksum("root ca certificate", "ca/root-ca.pem", "ab12");
        LoggingTransformer::log_store_operation("get", "ca/root-ca.pem", true);
        LoggingTransformer::log_certificate_facts("leaf certificate", "web", None);
        LoggingTransformer::log_engine_diagnostic("cfssl", "stderr", "  ");
        LoggingTransformer::log_performance_metric("sign", Duration::from_millis(150), true);
    }
}
