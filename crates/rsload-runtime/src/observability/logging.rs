//! Structured logging setup.
//!
//! Output goes through `tracing-subscriber`, as one JSON object per line or
//! as pretty text. A loader flush in JSON looks like:
//!
//! ```json
//! {"timestamp":"2024-01-15T10:30:00.000Z","level":"DEBUG","fields":{"message":"flushing batch","generation":0,"batch_size":2,"trigger":"size"},"target":"rsload_domain::loader::executor"}
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::{ConfigLoadError, LoggingSettings};

/// Logging options resolved from [`LoggingSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub json_format: bool,
    /// Used when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Emit span open and close events.
    pub include_spans: bool,
}

impl LoggingConfig {
    /// Resolves loaded settings; an unknown level is a configuration error.
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, ConfigLoadError> {
        let default_level =
            Level::from_str(&settings.level).map_err(|_| ConfigLoadError::Invalid {
                message: format!("logging.level is not a valid level: {}", settings.level),
            })?;

        Ok(Self {
            json_format: settings.json,
            default_level,
            include_spans: settings.spans,
        })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_level.to_string()))
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is kept.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(config.filter());

    let installed = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(config.span_events())
                    .with_current_span(config.include_spans)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(config.span_events())
                    .with_target(true),
            )
            .try_init()
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rsload_domain::{BatchFn, BatchOutput, DataLoader, LoaderConfig};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Collects everything written by the subscriber under test.
    #[derive(Clone, Default)]
    struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        fn lines(&self) -> Vec<serde_json::Value> {
            let buffer = self.buffer.lock().unwrap();
            String::from_utf8_lossy(&buffer)
                .lines()
                .filter(|line| !line.is_empty())
                .map(|line| {
                    serde_json::from_str(line)
                        .unwrap_or_else(|e| panic!("Log line should be valid JSON: {line} ({e})"))
                })
                .collect()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(writer: &CaptureWriter) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::registry().with(EnvFilter::new("trace")).with(
            fmt::layer()
                .json()
                .with_writer(writer.clone())
                .with_target(true),
        )
    }

    struct EchoFetcher;

    #[async_trait]
    impl BatchFn<String, String> for EchoFetcher {
        async fn load(&self, keys: &[String]) -> BatchOutput<String> {
            BatchOutput::from_values(keys.to_vec())
        }
    }

    fn settings(level: &str, json: bool, spans: bool) -> LoggingSettings {
        LoggingSettings {
            level: level.to_string(),
            json,
            spans,
        }
    }

    #[test]
    fn test_from_settings_maps_every_field() {
        let config = LoggingConfig::from_settings(&settings("debug", true, true)).unwrap();

        assert_eq!(
            config,
            LoggingConfig {
                json_format: true,
                default_level: Level::DEBUG,
                include_spans: true,
            }
        );
        assert_eq!(config.span_events(), FmtSpan::NEW | FmtSpan::CLOSE);
    }

    #[test]
    fn test_default_settings_disable_span_events() {
        let config = LoggingConfig::from_settings(&LoggingSettings::default()).unwrap();

        assert!(!config.json_format);
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.span_events(), FmtSpan::NONE);
    }

    #[test]
    fn test_from_settings_rejects_unknown_level() {
        let err = LoggingConfig::from_settings(&settings("loud", false, false)).unwrap_err();

        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_second_init_keeps_existing_subscriber() {
        let config = LoggingConfig::from_settings(&LoggingSettings::default()).unwrap();
        init_logging(&config);

        assert!(!init_logging(&config));
    }

    /// Test: Batch flushes are logged with their trigger
    #[tokio::test(flavor = "current_thread")]
    async fn test_batch_flush_is_logged_with_trigger() {
        // Arrange - current-thread runtime keeps spawned batch tasks on
        // the thread that holds the default subscriber
        let writer = CaptureWriter::default();
        let _guard = tracing::subscriber::set_default(capture(&writer));
        let loader = DataLoader::new(
            EchoFetcher,
            LoaderConfig::default()
                .with_max_batch_size(2)
                .with_wait(Duration::from_secs(60)),
        );

        // Act
        let results = loader
            .load_many(vec!["a".to_string(), "b".to_string()])
            .await;

        // Assert
        assert!(results.iter().all(Result::is_ok));
        let flushes: Vec<_> = writer
            .lines()
            .into_iter()
            .filter(|json| json["fields"]["message"] == "flushing batch")
            .collect();
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0]["fields"]["trigger"], "size");
        assert_eq!(flushes[0]["fields"]["batch_size"], 2);
        assert_eq!(flushes[0]["target"], "rsload_domain::loader::executor");
    }
}
