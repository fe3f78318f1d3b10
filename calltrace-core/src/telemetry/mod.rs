//! Bundled OpenTelemetry exporters and tracer wiring.
//!
//! Spans are produced by the OpenTelemetry SDK. The exporters here turn each
//! finished `SpanData` into a `SpanRecord` and keep it (`MemorySink`) or log it
//! (`LogSink`). Nothing is recorded unless a tracer is installed with
//! `set_global_tracer` or passed to an interceptor directly.

pub mod keys;
pub mod log_sink;
pub mod memory;
pub mod types;
#[cfg(test)]
pub mod test_capture;

pub use keys::*;
pub use log_sink::LogSink;
pub use memory::MemorySink;
pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::tracer::{SharedTracer, shared_tracer};

/// Instrumentation scope name for every tracer built here.
pub const INSTRUMENTATION_NAME: &str = "calltrace";

static GLOBAL_TRACER: OnceCell<SharedTracer> = OnceCell::new();

/// Install the process-wide tracer. Returns `false` if one is already installed.
///
/// This is a write-once global for the process lifetime (backed by `OnceCell`).
pub fn set_global_tracer(tracer: SharedTracer) -> bool {
    let installed = GLOBAL_TRACER.set(tracer).is_ok();
    if !installed {
        tracing::warn!("global tracer already installed; ignoring replacement");
    }
    installed
}

/// The installed tracer, or one from the OpenTelemetry global provider.
pub fn global_tracer() -> SharedTracer {
    GLOBAL_TRACER
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(opentelemetry::global::tracer(INSTRUMENTATION_NAME)))
}

pub fn tracer_for(provider: &SdkTracerProvider) -> SharedTracer {
    shared_tracer(provider.tracer(INSTRUMENTATION_NAME))
}
