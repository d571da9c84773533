//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries
//! - Pick pretty or JSON output from config
//! - Always log to stderr so stdout carries only command output
//!
//! # Design Decisions
//! - Library code only emits events; installing a subscriber is the host's call
//! - `RUST_LOG` overrides the configured level

use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Build the filter: `RUST_LOG` if set, otherwise `resilient_cache=<level>`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("resilient_cache={},cache_cli={}", level, level).into())
}

/// Install the global subscriber, writing to stderr.
///
/// Stdout stays free for command output. Returns an error if a global
/// subscriber is already set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    subscriber(config, std::io::stderr).try_init()
}

/// Build the subscriber for `config`, sending every event to `writer`.
pub fn subscriber<W>(
    config: &ObservabilityConfig,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (json, pretty) = if config.json_logs {
        (Some(fmt::layer().json().with_writer(writer)), None)
    } else {
        (None, Some(fmt::layer().with_writer(writer)))
    };
    tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(json)
        .with(pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(json_logs: bool) -> String {
        let capture = Capture::default();
        let config = ObservabilityConfig {
            log_level: "info".to_string(),
            json_logs,
        };
        let writer = capture.clone();
        tracing::subscriber::with_default(subscriber(&config, move || writer.clone()), || {
            tracing::info!(cache = "meta", "Cache cleared");
        });
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_json_logs_use_given_writer() {
        let out = captured(true);
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["fields"]["message"], "Cache cleared");
    }

    #[test]
    fn test_pretty_logs_use_given_writer() {
        assert!(captured(false).contains("Cache cleared"));
    }
}
