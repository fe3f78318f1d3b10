use opentelemetry::trace::Status;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};

use super::{SpanRecord, status_label};

/// Target used for every span event emitted by `LogSink`.
pub const LOG_TARGET: &str = "calltrace::span";

/// Exporter that writes each finished span as one `tracing` event.
///
/// Successful spans log at `info`, failed ones at `warn`. Attributes are
/// rendered as a single JSON object field.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }

    pub fn emit(&self, span: &SpanRecord) {
        let attributes = serde_json::to_string(&span.attributes).unwrap_or_default();
        let parent_id = span.parent_span_id.as_deref().unwrap_or_default();
        match &span.status {
            Status::Error { description } => tracing::warn!(
                target: LOG_TARGET,
                span_name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent_id,
                status = status_label(&span.status),
                error = %description,
                duration_us = span.duration_us,
                attributes = %attributes,
                "span finished with error"
            ),
            status => tracing::info!(
                target: LOG_TARGET,
                span_name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent_id,
                status = status_label(status),
                duration_us = span.duration_us,
                attributes = %attributes,
                "span finished"
            ),
        }
    }
}

impl SpanExporter for LogSink {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        for data in &batch {
            self.emit(&SpanRecord::from(data));
        }
        Ok(())
    }
}
