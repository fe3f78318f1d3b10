//! Dynamic values captured from intercepted calls.
//!
//! A `Payload` is the serializer's view of whatever crossed the call boundary:
//! arguments, named arguments and results. Typed Rust values get in through
//! `Payload::from_serialize`; values that only make sense as handles (clients,
//! documents, pipeline steps) go through the narrow `Opaque` capability.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Capability exposed by values the serializer cannot look inside on its own.
///
/// `Display` is the string representation used whenever nothing better is
/// available.
pub trait Opaque: fmt::Display + Send + Sync {
    /// Short type label, e.g. `"Document"` or `"RunnableLambda"`.
    fn type_name(&self) -> &str;

    /// Text-like accessor. Inside a mapping an opaque value is replaced by this.
    fn text(&self) -> Option<String> {
        None
    }

    /// Field mapping used by the encoder before falling back to `Display`.
    fn fields(&self) -> Option<Vec<(String, Payload)>> {
        None
    }
}

#[derive(Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Payload>),
    List(Vec<Payload>),
    /// Entries keep insertion order.
    Map(Vec<(String, Payload)>),
    Object(Arc<dyn Opaque>),
}

impl Payload {
    /// Build a map payload. Later duplicates replace earlier values in place.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Payload>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut out = Vec::new();
        for (k, v) in entries {
            upsert(&mut out, k.into(), v.into());
        }
        Payload::Map(out)
    }

    pub fn object(value: impl Opaque + 'static) -> Self {
        Payload::Object(Arc::new(value))
    }

    /// Convert any serde value. A value serde refuses to convert becomes the
    /// error text rather than an error.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Payload::from(v),
            Err(e) => Payload::Str(format!("<unserializable: {e}>")),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Payload::Null => "null",
            Payload::Bool(_) => "bool",
            Payload::Int(_) => "int",
            Payload::Float(_) => "float",
            Payload::Str(_) => "str",
            Payload::Tuple(_) => "tuple",
            Payload::List(_) => "list",
            Payload::Map(_) => "map",
            Payload::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_empty_container(&self) -> bool {
        match self {
            Payload::Tuple(items) | Payload::List(items) => items.is_empty(),
            Payload::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Payload::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Look up a key on a map payload, or on an opaque value's field mapping.
    pub fn get(&self, key: &str) -> Option<Payload> {
        match self {
            Payload::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Payload::Object(obj) => obj
                .fields()?
                .into_iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Insert or replace `key` in an ordered entry list, keeping the original slot.
pub fn upsert(entries: &mut Vec<(String, Payload)>, key: String, value: Payload) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => entries.push((key, value)),
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Null, Payload::Null) => true,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Str(a), Payload::Str(b)) => a == b,
            (Payload::Tuple(a), Payload::Tuple(b)) => a == b,
            (Payload::List(a), Payload::List(b)) => a == b,
            (Payload::Map(a), Payload::Map(b)) => a == b,
            (Payload::Object(a), Payload::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Null => f.write_str("Null"),
            Payload::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Payload::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Payload::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Payload::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Payload::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Payload::List(items) => f.debug_tuple("List").field(items).finish(),
            Payload::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Payload::Object(obj) => write!(f, "Object({})", obj.type_name()),
        }
    }
}

/// String representation, the serializer's last resort. Non-finite floats
/// print as `NaN` / `inf` instead of failing.
impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, items: &[Payload], open: &str, close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(close)
        }
        match self {
            Payload::Null => f.write_str("null"),
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::Int(i) => write!(f, "{i}"),
            Payload::Float(x) => write!(f, "{x}"),
            Payload::Str(s) => write!(f, "{s:?}"),
            Payload::Tuple(items) => seq(f, items, "(", ")"),
            Payload::List(items) => seq(f, items, "[", "]"),
            Payload::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
            Payload::Object(obj) => write!(f, "{obj}"),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Payload::Null,
            Value::Bool(b) => Payload::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Payload::Int(i),
                None => Payload::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Payload::Str(s),
            Value::Array(items) => Payload::List(items.into_iter().map(Payload::from).collect()),
            Value::Object(map) => {
                Payload::Map(map.into_iter().map(|(k, v)| (k, Payload::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Str(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Int(value)
    }
}

impl From<u32> for Payload {
    fn from(value: u32) -> Self {
        Payload::Int(i64::from(value))
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

impl From<f32> for Payload {
    fn from(value: f32) -> Self {
        Payload::Float(f64::from(value))
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Payload::Null)
    }
}

impl<T: Into<Payload>> From<Vec<T>> for Payload {
    fn from(value: Vec<T>) -> Self {
        Payload::List(value.into_iter().map(Into::into).collect())
    }
}

/// Positional and named arguments of one intercepted call, as payloads.
/// The wrapped operation never sees this; it keeps its own typed arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub args: Vec<Payload>,
    pub kwargs: Vec<(String, Payload)>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Payload>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Payload>) -> Self {
        upsert(&mut self.kwargs, key.into(), value.into());
        self
    }

    pub fn args_payload(&self) -> Payload {
        Payload::Tuple(self.args.clone())
    }

    pub fn kwargs_payload(&self) -> Payload {
        Payload::Map(self.kwargs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doc(&'static str);

    impl fmt::Display for Doc {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Doc({})", self.0)
        }
    }

    impl Opaque for Doc {
        fn type_name(&self) -> &str {
            "Document"
        }
        fn fields(&self) -> Option<Vec<(String, Payload)>> {
            Some(vec![("page_content".into(), Payload::from(self.0))])
        }
    }

    #[test]
    fn json_objects_keep_key_order() {
        let p = Payload::from(json!({"z": 1, "a": 2, "m": 3}));
        match p {
            Payload::Map(entries) => {
                let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["z", "a", "m"]);
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn map_builder_replaces_duplicates_in_place() {
        let p = Payload::map([("a", 1i64), ("b", 2), ("a", 3)]);
        assert_eq!(p, Payload::Map(vec![("a".into(), Payload::Int(3)), ("b".into(), Payload::Int(2))]));
    }

    #[test]
    fn get_reads_maps_and_object_fields() {
        let map = Payload::map([("k", "v")]);
        assert_eq!(map.get("k"), Some(Payload::from("v")));
        let doc = Payload::object(Doc("hello"));
        assert_eq!(doc.get("page_content"), Some(Payload::from("hello")));
        assert_eq!(doc.type_name(), "Document");
        assert!(Payload::Int(1).get("k").is_none());
    }

    #[test]
    fn display_is_total_for_non_finite_floats() {
        let p = Payload::List(vec![Payload::Float(f64::NAN), Payload::from("x")]);
        assert_eq!(p.to_string(), "[NaN, \"x\"]");
    }

    #[test]
    fn call_context_builder() {
        let call = CallContext::new().arg("hi").kwarg("temperature", 0.5f64).kwarg("temperature", 0.7f64);
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.kwargs, vec![("temperature".to_string(), Payload::Float(0.7))]);
    }
}
