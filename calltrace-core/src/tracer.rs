//! Span handling for interceptors on top of OpenTelemetry.
//!
//! Interceptors hold a `SharedTracer`, which boxes any OpenTelemetry tracer, and
//! keep each open span inside the `Context` that is current while the wrapped
//! operation runs.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use serde::Serialize;

use crate::attributes::{AttrValue, AttributeSet};
use crate::telemetry::keys::{KEY_EXCEPTION_MESSAGE, KEY_EXCEPTION_TYPE};

pub type SharedTracer = Arc<BoxedTracer>;

/// Box any OpenTelemetry tracer for use by interceptors.
pub fn shared_tracer<T>(tracer: T) -> SharedTracer
where
    T: Tracer + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    Arc::new(BoxedTracer::new(Box::new(tracer)))
}

/// Name of the span event that carries an exception.
pub const EXCEPTION_EVENT: &str = "exception";

pub(crate) const CANCELLED: &str = "operation cancelled";
pub(crate) const PANICKED: &str = "operation panicked";
/// Message recorded when an error's `Display` panics.
pub const UNPRINTABLE_ERROR: &str = "<unprintable error>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionEvent {
    #[serde(rename = "exception.type")]
    pub type_name: String,
    #[serde(rename = "exception.message")]
    pub message: String,
}

impl ExceptionEvent {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Event for an error value; the type is the error's Rust type name.
    pub fn from_error<E: fmt::Display + ?Sized>(err: &E) -> Self {
        let message = panic::catch_unwind(AssertUnwindSafe(|| err.to_string()))
            .unwrap_or_else(|_| UNPRINTABLE_ERROR.to_string());
        Self::new(type_name::<E>(), message)
    }

    /// Read back from a finished span event's attributes.
    pub fn from_attributes(attrs: &[KeyValue]) -> Self {
        let read = |key: &str| {
            attrs
                .iter()
                .find(|kv| kv.key.as_str() == key)
                .map(|kv| kv.value.as_str().into_owned())
                .unwrap_or_default()
        };
        Self::new(read(KEY_EXCEPTION_TYPE), read(KEY_EXCEPTION_MESSAGE))
    }

    pub fn key_values(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(KEY_EXCEPTION_TYPE, self.type_name.clone()),
            KeyValue::new(KEY_EXCEPTION_MESSAGE, self.message.clone()),
        ]
    }
}

/// Owns an open span until the operation settles.
///
/// If the guard is dropped unsettled (the future was dropped mid-flight or the
/// operation panicked) the span is closed with an error status first.
pub struct SpanGuard {
    cx: Context,
    settled: bool,
}

impl SpanGuard {
    /// Start `name` as a child of the span active in `parent`, if any.
    pub fn start(
        tracer: &BoxedTracer,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        parent: &Context,
        attrs: &AttributeSet,
    ) -> Self {
        let span = tracer
            .span_builder(name)
            .with_kind(kind)
            .with_attributes(attrs.to_key_values())
            .start_with_context(tracer, parent);
        Self {
            cx: parent.with_span(span),
            settled: false,
        }
    }

    /// Context with this span active; attach it while the operation runs.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn set_attribute(&self, key: &str, value: impl Into<AttrValue>) {
        self.cx.span().set_attribute(value.into().to_key_value(key));
    }

    pub fn succeed(mut self) {
        self.cx.span().set_status(Status::Ok);
        self.close();
    }

    pub fn fail(mut self, event: ExceptionEvent) {
        self.record_failure(&event);
        self.close();
    }

    /// Settle from a `Result`: `Ok` → OK status, `Err` → exception + error status.
    pub fn settle<T, E: fmt::Display>(self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.succeed(),
            Err(err) => self.fail(ExceptionEvent::from_error(err)),
        }
    }

    fn record_failure(&self, event: &ExceptionEvent) {
        let span = self.cx.span();
        span.add_event(EXCEPTION_EVENT, event.key_values());
        span.set_status(Status::error(event.message.clone()));
    }

    fn close(&mut self) {
        self.cx.span().end();
        self.settled = true;
    }
}

impl fmt::Debug for SpanGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanGuard")
            .field("span", self.cx.span().span_context())
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let event = if std::thread::panicking() {
            ExceptionEvent::new("Panic", PANICKED)
        } else {
            ExceptionEvent::new("Cancelled", CANCELLED)
        };
        self.record_failure(&event);
        self.close();
    }
}
