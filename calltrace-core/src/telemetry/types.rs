use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{SpanId, SpanKind, Status};
use opentelemetry_sdk::trace::SpanData;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::attributes::{AttrValue, AttributeSet};
use crate::tracer::{EXCEPTION_EVENT, ExceptionEvent};

/// A finished span as kept by `MemorySink` and logged by `LogSink`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanRecord {
    pub name: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: SpanKind,
    /// Hex-encoded ids, as OpenTelemetry prints them.
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub attributes: AttributeSet,
    #[serde(serialize_with = "serialize_status")]
    pub status: Status,
    pub events: Vec<ExceptionEvent>,

    /// Wall-clock start, milliseconds since the Unix epoch.
    pub start_unix_ms: u64,
    /// Elapsed time in microseconds.
    pub duration_us: u64,
}

impl SpanRecord {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get_str(key)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, Status::Error { .. })
    }
}

impl From<&SpanData> for SpanRecord {
    fn from(data: &SpanData) -> Self {
        let parent = data.parent_span_id;
        Self {
            name: data.name.to_string(),
            kind: data.span_kind.clone(),
            trace_id: data.span_context.trace_id().to_string(),
            span_id: data.span_context.span_id().to_string(),
            parent_span_id: (parent != SpanId::INVALID).then(|| parent.to_string()),
            attributes: AttributeSet::from(data.attributes.as_slice()),
            status: data.status.clone(),
            events: data
                .events
                .events
                .iter()
                .filter(|ev| ev.name == EXCEPTION_EVENT)
                .map(|ev| ExceptionEvent::from_attributes(&ev.attributes))
                .collect(),
            start_unix_ms: data
                .start_time
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            duration_us: elapsed_us(data.start_time, data.end_time),
        }
    }
}

fn elapsed_us(start: SystemTime, end: SystemTime) -> u64 {
    end.duration_since(start)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

pub fn kind_label(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Client => "client",
        SpanKind::Server => "server",
        SpanKind::Producer => "producer",
        SpanKind::Consumer => "consumer",
        SpanKind::Internal => "internal",
    }
}

pub fn status_label(status: &Status) -> &'static str {
    match status {
        Status::Unset => "unset",
        Status::Ok => "ok",
        Status::Error { .. } => "error",
    }
}

fn serialize_kind<S: Serializer>(kind: &SpanKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind_label(kind))
}

fn serialize_status<S: Serializer>(status: &Status, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("code", status_label(status))?;
    if let Status::Error { description } = status {
        map.serialize_entry("message", description.as_ref())?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::keys::{KEY_EXCEPTION_MESSAGE, KEY_EXCEPTION_TYPE};
    use serde_json::json;

    fn record(name: &str, status: Status) -> SpanRecord {
        SpanRecord {
            name: name.to_string(),
            kind: SpanKind::Client,
            trace_id: "0af7651916cd43dd8448eb211c80319c".into(),
            span_id: "b7ad6b7169203331".into(),
            parent_span_id: Some("00f067aa0ba902b7".into()),
            attributes: AttributeSet::new().with("task.name", "chat"),
            status,
            events: Vec::new(),
            start_unix_ms: 0,
            duration_us: 12,
        }
    }

    #[test]
    fn span_record_serializes() {
        let mut rec = record("cohere.client.chat", Status::error("boom"));
        rec.events.push(ExceptionEvent::new("Timeout", "boom"));

        let as_json = serde_json::to_value(&rec).unwrap();
        assert_eq!(as_json["name"], json!("cohere.client.chat"));
        assert_eq!(as_json["kind"], json!("client"));
        assert_eq!(as_json["parent_span_id"], json!("00f067aa0ba902b7"));
        assert_eq!(as_json["attributes"]["task.name"], json!("chat"));
        assert_eq!(as_json["status"], json!({"code": "error", "message": "boom"}));
        assert_eq!(as_json["events"][0][KEY_EXCEPTION_TYPE], json!("Timeout"));
        assert_eq!(as_json["events"][0][KEY_EXCEPTION_MESSAGE], json!("boom"));
        assert!(rec.is_error());
    }

    #[test]
    fn ok_status_has_no_message() {
        let as_json = serde_json::to_value(record("op", Status::Ok)).unwrap();
        assert_eq!(as_json["status"], json!({"code": "ok"}));
        assert_eq!(status_label(&Status::Unset), "unset");
    }
}
