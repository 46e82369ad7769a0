//! ## callscope-telemetry::logging
//! **Structured logging with tracing**
//!
//! `RUST_LOG` takes precedence over the configured level.

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. Later calls are ignored.
    pub fn init(default_level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
            .try_init();
    }

    /// Logs a capture lifecycle event with its metadata.
    #[inline]
    pub fn log_event(event_type: &str, metadata: &[(&str, String)]) {
        let span = info_span!("capture_event", event_type = event_type);
        let _guard = span.enter();
        tracing::info!(metadata = ?metadata, "Capture event occurred");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn log_event_emits_metadata() {
        EventLogger::log_event("capture_started", &[("sources", "2".to_string())]);
        assert!(logs_contain("Capture event occurred"));
        assert!(logs_contain("capture_started"));
    }
}
