//! Ambient trace context: the current span and the extra-attribute bag.
//!
//! Both live in the current `opentelemetry::Context`. Synchronous code attaches
//! it for a scope; async code carries it with `FutureExt::with_context`, which
//! installs it around every poll, so a chain keeps its context when the
//! executor moves it between threads and concurrent chains never observe each
//! other's values.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use opentelemetry::Context;
use opentelemetry::context::{FutureExt, WithContext};
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::SpanKind;

use crate::attributes::AttributeSet;
use crate::tracer::SpanGuard;

/// Context value holding the merged extra attributes.
#[derive(Debug, Clone, PartialEq)]
struct ExtraAttributes(Arc<AttributeSet>);

pub trait ExtraAttributesExt {
    /// Extra attributes carried by this context; empty when none are set.
    fn extra_attributes(&self) -> AttributeSet;

    /// Copy of this context with `attrs` merged over the existing bag.
    fn with_extra_attributes(&self, attrs: &AttributeSet) -> Self;
}

impl ExtraAttributesExt for Context {
    fn extra_attributes(&self) -> AttributeSet {
        self.get::<ExtraAttributes>()
            .map(|bag| (*bag.0).clone())
            .unwrap_or_default()
    }

    fn with_extra_attributes(&self, attrs: &AttributeSet) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }
        let mut merged = self.extra_attributes();
        merged.extend(attrs);
        self.with_value(ExtraAttributes(Arc::new(merged)))
    }
}

/// Extra attributes of the current context; empty when none are set.
pub fn extra_attributes() -> AttributeSet {
    Context::map_current(|cx| cx.extra_attributes())
}

/// Run `f` with `attrs` merged into the ambient bag.
pub fn inject_additional_attributes<R>(attrs: &AttributeSet, f: impl FnOnce() -> R) -> R {
    let _guard = Context::current().with_extra_attributes(attrs).attach();
    f()
}

pub fn inject_additional_attributes_async<F: Future>(attrs: &AttributeSet, fut: F) -> WithContext<F> {
    fut.with_context(Context::current().with_extra_attributes(attrs))
}

fn open_root(tracer: &BoxedTracer, name: &str) -> SpanGuard {
    let ambient = Context::current();
    SpanGuard::start(
        tracer,
        name.to_string(),
        SpanKind::Internal,
        &ambient,
        &ambient.extra_attributes(),
    )
}

/// Open an `Internal` span around `f` and make it the parent of every
/// intercepted call inside. The span's status follows the returned `Result`.
pub fn with_root_span<T, E, F>(tracer: &BoxedTracer, name: &str, f: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    let guard = open_root(tracer, name);
    let result = {
        let _attached = guard.context().clone().attach();
        f()
    };
    guard.settle(&result);
    result
}

pub async fn with_root_span_async<T, E, F>(tracer: &BoxedTracer, name: &str, fut: F) -> Result<T, E>
where
    E: fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let guard = open_root(tracer, name);
    let result = fut.with_context(guard.context().clone()).await;
    guard.settle(&result);
    result
}
