//! Clean-and-encode of captured payloads into span-ready JSON text.
//!
//! `to_json_string` never fails: anything it cannot encode is written as the
//! payload's string representation instead. Opaque values are user code, so a
//! panic while walking them is treated like any other encoding failure.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::Formatter;
use thiserror::Error;

use crate::payload::{Opaque, Payload};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Written when neither encoding nor `Display` of a payload succeeds.
pub const UNSERIALIZABLE: &str = "<unserializable>";

#[derive(Debug, Error)]
enum EncodeError {
    #[error("non-finite float {0}")]
    NonFinite(f64),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Serializer {
    max_depth: usize,
}

impl Default for Serializer {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Serializer {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Strip noise from a payload: trims strings, drops nulls, blank strings and
    /// containers that end up empty. The top-level value itself is never dropped.
    pub fn clean(&self, value: &Payload) -> Payload {
        match value {
            Payload::Str(s) => Payload::Str(s.trim().to_string()),
            Payload::Tuple(items) => Payload::Tuple(self.clean_seq(items, 0)),
            Payload::List(items) => Payload::List(self.clean_seq(items, 0)),
            Payload::Map(entries) => Payload::Map(self.clean_map(entries, 0)),
            other => other.clone(),
        }
    }

    /// Clean then encode as JSON text with `", "` / `": "` separators.
    pub fn to_json_string(&self, value: &Payload) -> String {
        let encoded = panic::catch_unwind(AssertUnwindSafe(|| {
            let cleaned = self.clean(value);
            let mut visiting = Vec::new();
            self.encode(&cleaned, 0, &mut visiting)
                .and_then(|json| write_spaced(&json))
        }));
        match encoded {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "payload encoding fell back to string form");
                display_or_placeholder(value)
            }
            Err(_) => {
                tracing::debug!("payload capability panicked, falling back to string form");
                display_or_placeholder(value)
            }
        }
    }

    fn clean_seq(&self, items: &[Payload], depth: usize) -> Vec<Payload> {
        items
            .iter()
            .filter_map(|item| match item {
                Payload::Null => None,
                Payload::Str(s) => non_blank(s).map(Payload::Str),
                Payload::Tuple(_) | Payload::List(_) | Payload::Map(_) => {
                    self.clean_container(item, depth + 1)
                }
                other => Some(other.clone()),
            })
            .collect()
    }

    fn clean_map(&self, entries: &[(String, Payload)], depth: usize) -> Vec<(String, Payload)> {
        entries
            .iter()
            .filter_map(|(key, value)| {
                let cleaned = match value {
                    Payload::Null => None,
                    Payload::Str(s) => non_blank(s).map(Payload::Str),
                    // mapped opaque values only survive through their text
                    Payload::Object(obj) => obj.text().as_deref().and_then(non_blank).map(Payload::Str),
                    Payload::Tuple(_) | Payload::List(_) | Payload::Map(_) => {
                        self.clean_container(value, depth + 1)
                    }
                    scalar => Some(scalar.clone()),
                };
                cleaned.map(|v| (key.clone(), v))
            })
            .collect()
    }

    fn clean_container(&self, value: &Payload, depth: usize) -> Option<Payload> {
        if depth > self.max_depth {
            return Some(Payload::Str(format!("<{} nested too deep>", value.type_name())));
        }
        let cleaned = match value {
            Payload::Tuple(items) => Payload::Tuple(self.clean_seq(items, depth)),
            Payload::List(items) => Payload::List(self.clean_seq(items, depth)),
            Payload::Map(entries) => Payload::Map(self.clean_map(entries, depth)),
            other => return Some(other.clone()),
        };
        if cleaned.is_empty_container() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn encode(
        &self,
        value: &Payload,
        depth: usize,
        visiting: &mut Vec<*const ()>,
    ) -> Result<serde_json::Value, EncodeError> {
        use serde_json::Value;
        Ok(match value {
            Payload::Null => Value::Null,
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Int(i) => Value::from(*i),
            Payload::Float(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .ok_or(EncodeError::NonFinite(*x))?,
            Payload::Str(s) => Value::String(s.clone()),
            Payload::Tuple(items) | Payload::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.encode(item, depth + 1, visiting))
                    .collect::<Result<_, _>>()?,
            ),
            Payload::Map(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k.clone(), self.encode(v, depth + 1, visiting)?);
                }
                Value::Object(map)
            }
            Payload::Object(obj) => self.encode_object(obj, depth, visiting)?,
        })
    }

    fn encode_object(
        &self,
        obj: &Arc<dyn Opaque>,
        depth: usize,
        visiting: &mut Vec<*const ()>,
    ) -> Result<serde_json::Value, EncodeError> {
        let ptr = Arc::as_ptr(obj) as *const ();
        if depth >= self.max_depth || visiting.contains(&ptr) {
            return Ok(serde_json::Value::String(obj.to_string()));
        }
        let Some(fields) = obj.fields() else {
            return Ok(serde_json::Value::String(obj.to_string()));
        };
        visiting.push(ptr);
        let cleaned = self.clean(&Payload::Map(fields));
        let encoded = self.encode(&cleaned, depth + 1, visiting);
        visiting.pop();
        encoded
    }
}

fn display_or_placeholder(value: &Payload) -> String {
    panic::catch_unwind(AssertUnwindSafe(|| value.to_string()))
        .unwrap_or_else(|_| UNSERIALIZABLE.to_string())
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Compact JSON with a space after `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

fn write_spaced(value: &serde_json::Value) -> Result<String, EncodeError> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

/// Serialize with the default depth limit.
pub fn to_json_string(value: &Payload) -> String {
    Serializer::default().to_json_string(value)
}
