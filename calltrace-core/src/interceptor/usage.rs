use serde::{Deserialize, Serialize};

use crate::attributes::guarded;
use crate::payload::Payload;
use crate::telemetry::keys::{KEY_USAGE_COMPLETION_TOKENS, KEY_USAGE_PROMPT_TOKENS};
use crate::tracer::SpanGuard;

const USAGE_FIELD: &str = "usage_metadata";

/// Token counts reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl UsageMetadata {
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Read `{input_tokens, output_tokens}` out of a map or object payload.
    /// Both counts must be present.
    pub fn from_payload(value: &Payload) -> Option<Self> {
        Some(Self::new(
            value.get("input_tokens")?.as_i64()?,
            value.get("output_tokens")?.as_i64()?,
        ))
    }
}

/// What an interceptor can learn from a successful result.
pub trait Traceable {
    /// Payload written to `call.outputs`.
    fn to_payload(&self) -> Payload;

    fn usage_metadata(&self) -> Option<UsageMetadata> {
        None
    }
}

impl Traceable for Payload {
    fn to_payload(&self) -> Payload {
        self.clone()
    }

    fn usage_metadata(&self) -> Option<UsageMetadata> {
        self.get(USAGE_FIELD).as_ref().and_then(UsageMetadata::from_payload)
    }
}

impl Traceable for serde_json::Value {
    fn to_payload(&self) -> Payload {
        Payload::from(self.clone())
    }

    fn usage_metadata(&self) -> Option<UsageMetadata> {
        self.get(USAGE_FIELD)
            .and_then(|usage| serde_json::from_value(usage.clone()).ok())
    }
}

impl Traceable for String {
    fn to_payload(&self) -> Payload {
        Payload::Str(self.clone())
    }
}

impl Traceable for () {
    fn to_payload(&self) -> Payload {
        Payload::Null
    }
}

impl<T: Traceable> Traceable for Vec<T> {
    fn to_payload(&self) -> Payload {
        Payload::List(self.iter().map(Traceable::to_payload).collect())
    }
}

/// Write the usage attributes when the result carries usage metadata.
/// A result whose usage accessor panics is treated as carrying none.
pub(crate) fn project<R: Traceable + ?Sized>(result: &R, span: &SpanGuard) {
    if let Some(usage) = guarded(|| result.usage_metadata()) {
        span.set_attribute(KEY_USAGE_PROMPT_TOKENS, usage.input_tokens);
        span.set_attribute(KEY_USAGE_COMPLETION_TOKENS, usage.output_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_from_map_payload() {
        let result = Payload::map([
            ("content", Payload::from("hi")),
            ("usage_metadata", Payload::map([("input_tokens", 12i64), ("output_tokens", 34i64)])),
        ]);
        assert_eq!(result.usage_metadata(), Some(UsageMetadata::new(12, 34)));
    }

    #[test]
    fn partial_usage_is_ignored() {
        let result = Payload::map([("usage_metadata", Payload::map([("input_tokens", 12i64)]))]);
        assert_eq!(result.usage_metadata(), None);
        assert_eq!(Payload::from("plain").usage_metadata(), None);
    }

    #[test]
    fn usage_from_json_value() {
        let value = json!({"usage_metadata": {"input_tokens": 1, "output_tokens": 2}});
        assert_eq!(value.usage_metadata(), Some(UsageMetadata::new(1, 2)));
        assert_eq!(json!({"usage_metadata": null}).usage_metadata(), None);
    }
}
