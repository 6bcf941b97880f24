//! Observability infrastructure for probemap.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors for the catalog and
//! publish paths.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `probemap_engine=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for artifact-catalog operations with standard fields.
#[must_use]
pub fn catalog_span(operation: &str, subject_id: &str) -> Span {
    tracing::info_span!("catalog", op = operation, subject = subject_id)
}

/// Creates a span for publish-lifecycle operations.
#[must_use]
pub fn publish_span(operation: &str, name: &str) -> Span {
    tracing::info_span!("publish", op = operation, name = name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = catalog_span("processed_artifacts", "123456");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = publish_span("publish_and_register", "123456_data-converter-manifest");
        let _guard = span.enter();
        tracing::info!("publish message");
    }
}
