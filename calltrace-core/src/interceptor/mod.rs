//! Interception wrapper: one `Interceptor` per traced target method.
//!
//! An interceptor opens a `Client` span around the wrapped operation, writes
//! the attribute set, makes the span current while the operation runs and
//! records the outcome. The operation's own result is always handed back
//! untouched; tracing problems never change it.

pub mod composite;
pub mod usage;

pub use usage::{Traceable, UsageMetadata};

use std::fmt;
use std::future::Future;

use opentelemetry::Context;
use opentelemetry::context::FutureExt;
use opentelemetry::trace::{SpanKind, TraceContextExt};
use serde::{Deserialize, Serialize};
use tracing_futures::Instrument;

use crate::attributes::{AttributeBuilder, AttributeSet, ProviderIdentity, RequestParams, capture};
use crate::context::ExtraAttributesExt;
use crate::payload::CallContext;
use crate::serializer::Serializer;
use crate::telemetry::keys::{KEY_CALL_OUTPUTS, KEY_SPAN_NAME};
use crate::tracer::{SharedTracer, SpanGuard};

/// How inputs and outputs of a target are captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Request parameters plus the full serialized arguments and result.
    #[default]
    Generic,
    /// Pipeline-like targets: heuristic projection of inputs and outputs.
    Composite,
}

pub struct Interceptor {
    method: String,
    task: String,
    tracer: SharedTracer,
    identity: ProviderIdentity,
    trace_input: bool,
    trace_output: bool,
    variant: Variant,
    serializer: Serializer,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("method", &self.method)
            .field("task", &self.task)
            .field("identity", &self.identity)
            .field("trace_input", &self.trace_input)
            .field("trace_output", &self.trace_output)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

pub struct InterceptorBuilder {
    method: String,
    task: String,
    tracer: SharedTracer,
    identity: Option<ProviderIdentity>,
    provider_version: String,
    trace_input: bool,
    trace_output: bool,
    variant: Variant,
    serializer: Serializer,
}

impl InterceptorBuilder {
    pub fn identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Version written to `service.version` when no explicit identity is set.
    pub fn provider_version(mut self, version: impl Into<String>) -> Self {
        self.provider_version = version.into();
        self
    }

    pub fn trace_input(mut self, enabled: bool) -> Self {
        self.trace_input = enabled;
        self
    }

    pub fn trace_output(mut self, enabled: bool) -> Self {
        self.trace_output = enabled;
        self
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn build(self) -> Interceptor {
        let identity = match self.identity {
            Some(identity) => identity,
            None => {
                let service = self.method.split('.').next().unwrap_or_default().to_string();
                ProviderIdentity::framework(service, self.provider_version)
            }
        };
        tracing::debug!(
            method = %self.method,
            task = %self.task,
            service = %identity.service_name,
            variant = ?self.variant,
            "interceptor ready"
        );
        Interceptor {
            method: self.method,
            task: self.task,
            tracer: self.tracer,
            identity,
            trace_input: self.trace_input,
            trace_output: self.trace_output,
            variant: self.variant,
            serializer: self.serializer,
        }
    }
}

/// Generic interceptor for `method` with a framework identity derived from the
/// method's leading module segment.
pub fn make_interceptor(
    method: impl Into<String>,
    task: impl Into<String>,
    tracer: SharedTracer,
    provider_version: impl Into<String>,
    trace_input: bool,
    trace_output: bool,
) -> Interceptor {
    Interceptor::builder(method, task, tracer)
        .provider_version(provider_version)
        .trace_input(trace_input)
        .trace_output(trace_output)
        .build()
}

impl Interceptor {
    pub fn builder(method: impl Into<String>, task: impl Into<String>, tracer: SharedTracer) -> InterceptorBuilder {
        InterceptorBuilder {
            method: method.into(),
            task: task.into(),
            tracer,
            identity: None,
            provider_version: String::new(),
            trace_input: true,
            trace_output: true,
            variant: Variant::Generic,
            serializer: Serializer::default(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Trace a synchronous operation.
    ///
    /// `instance` is read for request parameters and `call` describes the
    /// arguments; neither is passed to `op`, which runs with its own typed
    /// arguments. Returns exactly what `op` returned.
    pub fn invoke<I, R, E, F>(&self, instance: &I, call: &CallContext, op: F) -> Result<R, E>
    where
        I: RequestParams + ?Sized,
        R: Traceable,
        E: fmt::Display,
        F: FnOnce() -> Result<R, E>,
    {
        let guard = self.open(instance, call);
        let result = {
            let _attached = guard.context().clone().attach();
            op()
        };
        self.settle(guard, &result);
        result
    }

    /// Async counterpart of [`invoke`](Self::invoke). The span stays open
    /// across every suspension point and is current whenever `fut` is polled.
    /// Dropping the returned future before it completes closes the span with
    /// an error status.
    pub async fn invoke_async<I, R, E, F>(&self, instance: &I, call: &CallContext, fut: F) -> Result<R, E>
    where
        I: RequestParams + ?Sized,
        R: Traceable,
        E: fmt::Display,
        F: Future<Output = Result<R, E>>,
    {
        let guard = self.open(instance, call);
        let result = fut
            .with_context(guard.context().clone())
            .instrument(tracing::debug_span!("intercept", method = %self.method))
            .await;
        self.settle(guard, &result);
        result
    }

    fn span_name(&self, extra: &AttributeSet) -> String {
        match extra.get(KEY_SPAN_NAME).map(ToString::to_string) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{}", self.method),
            _ => self.method.clone(),
        }
    }

    fn open<I>(&self, instance: &I, call: &CallContext) -> SpanGuard
    where
        I: RequestParams + ?Sized,
    {
        let ambient = Context::current();
        let extra = ambient.extra_attributes();
        let attrs = capture(|| {
            AttributeBuilder::new(&self.identity, &self.serializer)
                .variant(self.variant)
                .trace_input(self.trace_input)
                .build(instance, call, &self.task, &extra)
        })
        .unwrap_or_else(|| {
            tracing::debug!(method = %self.method, "attribute capture panicked");
            extra.clone()
        });
        let name = self.span_name(&extra);
        tracing::debug!(
            span = %name,
            parent = %ambient.span().span_context().span_id(),
            "opening span"
        );
        SpanGuard::start(&self.tracer, name, SpanKind::Client, &ambient, &attrs)
    }

    /// Render the result for `call.outputs`; `None` if the result's own
    /// capabilities panicked.
    fn render_output<R: Traceable>(&self, value: &R) -> Option<String> {
        capture(|| {
            let payload = value.to_payload();
            match self.variant {
                Variant::Generic => self.serializer.to_json_string(&payload),
                Variant::Composite => composite::project_outputs(&payload, &self.serializer),
            }
        })
    }

    fn settle<R, E>(&self, guard: SpanGuard, result: &Result<R, E>)
    where
        R: Traceable,
        E: fmt::Display,
    {
        if let Ok(value) = result {
            if self.trace_output {
                match self.render_output(value) {
                    Some(rendered) => guard.set_attribute(KEY_CALL_OUTPUTS, rendered),
                    None => tracing::debug!(method = %self.method, "output capture panicked"),
                }
            }
            usage::project(value, &guard);
        }
        guard.settle(result);
    }
}
