//! Span attribute values and the per-call attribute builder.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use opentelemetry::{KeyValue, Value};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use crate::interceptor::Variant;
use crate::interceptor::composite;
use crate::payload::{CallContext, Payload};
use crate::serializer::Serializer;
use crate::telemetry::keys::*;

pub const DEFAULT_SDK_NAME: &str = "calltrace-rs";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(x) => Some(*x),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl AttrValue {
    pub fn to_key_value(&self, key: &str) -> KeyValue {
        let value = match self {
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::I64(*i),
            AttrValue::Float(x) => Value::F64(*x),
            AttrValue::Str(s) => Value::from(s.clone()),
        };
        KeyValue::new(key.to_string(), value)
    }
}

/// Arrays and other exotic values arrive as their string form.
impl From<&Value> for AttrValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::I64(i) => AttrValue::Int(*i),
            Value::F64(x) => AttrValue::Float(*x),
            other => AttrValue::Str(other.to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// Insertion-ordered attribute map. Writing an existing key replaces the value
/// in its original slot (last writer wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    entries: Vec<(String, AttrValue)>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert only when a value is present; `None` never becomes a key.
    pub fn insert_opt<V: Into<AttrValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.insert(key, v);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn extend(&mut self, other: &AttributeSet) {
        for (k, v) in &other.entries {
            self.insert(k.clone(), v.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_key_values(&self) -> Vec<KeyValue> {
        self.entries.iter().map(|(k, v)| v.to_key_value(k)).collect()
    }
}

impl From<&[KeyValue]> for AttributeSet {
    fn from(kvs: &[KeyValue]) -> Self {
        kvs.iter()
            .map(|kv| (kv.key.as_str().to_string(), AttrValue::from(&kv.value)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = AttributeSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl Serialize for AttributeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Fixed identity of the instrumented library, written on every span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub sdk_name: String,
    pub service_name: String,
    /// `"framework"` for orchestration libraries, otherwise the provider name.
    pub service_type: String,
    pub service_version: String,
    pub sdk_version: String,
}

impl ProviderIdentity {
    pub fn framework(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            sdk_name: DEFAULT_SDK_NAME.to_string(),
            service_name: service_name.into(),
            service_type: SERVICE_TYPE_FRAMEWORK.to_string(),
            service_version: service_version.into(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    pub fn provider(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        let service_name = service_name.into();
        Self {
            sdk_name: DEFAULT_SDK_NAME.to_string(),
            service_type: service_name.clone(),
            service_name,
            service_version: service_version.into(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    pub fn with_sdk_name(mut self, name: impl Into<String>) -> Self {
        self.sdk_name = name.into();
        self
    }
}

/// Optional request parameters a call target may expose.
///
/// Every accessor defaults to `None`; a target only implements the ones it has.
/// A missing value means the attribute is omitted, never written as null.
pub trait RequestParams {
    fn model(&self) -> Option<String> {
        None
    }
    fn max_output_tokens(&self) -> Option<i64> {
        None
    }
    fn top_k(&self) -> Option<i64> {
        None
    }
    fn top_p(&self) -> Option<f64> {
        None
    }
    fn temperature(&self) -> Option<f64> {
        None
    }
    /// Named steps of a pipeline-like target; only read by the composite variant.
    fn steps(&self) -> Option<Vec<(String, Payload)>> {
        None
    }
}

/// Target that exposes no request parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

impl RequestParams for NoParams {}

impl RequestParams for () {}

/// Read one optional capability of user code. A panic counts as absent and
/// does not affect the other reads.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Option<T>) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).ok().flatten()
}

/// Like `guarded` for a value that is always produced when nothing panics.
pub(crate) fn capture<T>(f: impl FnOnce() -> T) -> Option<T> {
    guarded(|| Some(f()))
}

pub struct AttributeBuilder<'a> {
    identity: &'a ProviderIdentity,
    serializer: &'a Serializer,
    variant: Variant,
    trace_input: bool,
}

impl<'a> AttributeBuilder<'a> {
    pub fn new(identity: &'a ProviderIdentity, serializer: &'a Serializer) -> Self {
        Self {
            identity,
            serializer,
            variant: Variant::Generic,
            trace_input: true,
        }
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn trace_input(mut self, enabled: bool) -> Self {
        self.trace_input = enabled;
        self
    }

    /// Assemble the full attribute set for one call.
    ///
    /// Order: identity keys, request parameters, ambient extras (which may
    /// override anything before them), then the input/metadata blobs.
    pub fn build<I>(&self, instance: &I, call: &CallContext, task: &str, extra: &AttributeSet) -> AttributeSet
    where
        I: RequestParams + ?Sized,
    {
        let id = self.identity;
        let mut attrs = AttributeSet::new()
            .with(KEY_SDK_NAME, id.sdk_name.as_str())
            .with(KEY_SERVICE_NAME, id.service_name.as_str())
            .with(KEY_SERVICE_TYPE, id.service_type.as_str())
            .with(KEY_SERVICE_VERSION, id.service_version.as_str())
            .with(KEY_SDK_VERSION, id.sdk_version.as_str())
            .with(KEY_TASK_NAME, task);

        attrs.insert_opt(KEY_REQUEST_MODEL, guarded(|| instance.model()).filter(|m| !m.is_empty()));
        attrs.insert_opt(KEY_REQUEST_MAX_TOKENS, guarded(|| instance.max_output_tokens()));
        attrs.insert_opt(KEY_REQUEST_TOP_K, guarded(|| instance.top_k()));
        attrs.insert_opt(KEY_REQUEST_TOP_P, guarded(|| instance.top_p()).filter(|v| v.is_finite()));
        attrs.insert_opt(
            KEY_REQUEST_TEMPERATURE,
            guarded(|| instance.temperature()).filter(|v| v.is_finite()),
        );

        attrs.extend(extra);

        if self.trace_input {
            let inputs = guarded(|| match self.variant {
                Variant::Generic if !call.args.is_empty() => Some(call.args_payload()),
                Variant::Generic => None,
                Variant::Composite => Some(composite::project_inputs(instance, call)),
            });
            if let Some(inputs) = inputs {
                attrs.insert(KEY_CALL_INPUTS, self.serializer.to_json_string(&inputs));
            }
        }
        attrs.insert(
            KEY_CALL_METADATA,
            self.serializer.to_json_string(&call.kwargs_payload()),
        );
        attrs
    }
}
