//! `tracing` subscriber setup for the interception layer.
//!
//! The framework itself only emits `tracing` events. Level mapping for the
//! host's five log levels: info, warning (`warn`), error, debug, and success,
//! which is an `info` event carrying `status = "success"`.

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::config::InterceptConfig;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `debug` when
/// `config.debug` is set and `info` when it is not.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &InterceptConfig, format: LogFormat) -> anyhow::Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Root span carrying the configured logger prefix. Enter it around the
/// host's startup and call paths so every event is tagged.
#[must_use]
pub fn root_span(config: &InterceptConfig) -> Span {
    tracing::info_span!("quest_events", prefix = %config.logger_prefix.trim())
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    /// Records `(span name, field, value)` for every new span.
    #[derive(Clone, Default)]
    struct SpanFields(Arc<Mutex<Vec<(String, String, String)>>>);

    struct FieldVisitor<'a> {
        span: &'static str,
        out: &'a mut Vec<(String, String, String)>,
    }

    impl Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.out
                .push((self.span.to_string(), field.name().to_string(), format!("{value:?}")));
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for SpanFields {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let mut out = self.0.lock();
            attrs.record(&mut FieldVisitor {
                span: attrs.metadata().name(),
                out: &mut out,
            });
        }
    }

    #[test]
    fn root_span_carries_the_trimmed_prefix() {
        let fields = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(fields.clone());

        let name = tracing::subscriber::with_default(subscriber, || {
            let span = root_span(&InterceptConfig::default());
            assert!(!span.is_disabled());
            span.metadata().map(|meta| meta.name())
        });

        assert_eq!(name, Some("quest_events"));
        assert_eq!(
            *fields.0.lock(),
            vec![(
                "quest_events".to_string(),
                "prefix".to_string(),
                "[QuestEvents]".to_string()
            )]
        );
    }

    #[test]
    fn init_installs_the_global_subscriber_once() {
        let config = InterceptConfig {
            debug: true,
            ..InterceptConfig::default()
        };

        init(&config, LogFormat::Json).unwrap();
        let err = init(&config, LogFormat::Text).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to install tracing subscriber"));
    }

    #[test]
    fn default_format_is_text() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
