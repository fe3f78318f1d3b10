use serde::{Deserialize, Serialize};

use crate::attributes::RequestParams;
use crate::interceptor::{Traceable, UsageMetadata};
use crate::payload::{CallContext, Payload};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ChatRequest {
    /// Messages are the positional argument; the remaining options are named.
    pub fn call_context(&self) -> CallContext {
        CallContext::new()
            .arg(Payload::from_serialize(&self.messages))
            .kwarg("stop_sequences", self.stop_sequences.clone())
            .kwarg(
                "metadata",
                self.metadata.clone().map(Payload::from).unwrap_or(Payload::Null),
            )
            .kwarg("request_id", self.request_id.clone())
    }
}

impl RequestParams for ChatRequest {
    fn model(&self) -> Option<String> {
        Some(self.model.clone())
    }
    fn max_output_tokens(&self) -> Option<i64> {
        self.max_output_tokens.map(i64::from)
    }
    fn top_k(&self) -> Option<i64> {
        self.top_k.map(i64::from)
    }
    fn top_p(&self) -> Option<f64> {
        self.top_p
    }
    fn temperature(&self) -> Option<f64> {
        self.temperature
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatResponse {
    pub model: String,
    pub text: String,
    pub usage_prompt: u32,
    pub usage_completion: u32,
    pub provider: String,
    pub provider_request_id: Option<String>,
    pub created_at_ms: i64,
    pub latency_ms: u32,
}

impl Traceable for ChatResponse {
    fn to_payload(&self) -> Payload {
        Payload::from_serialize(self)
    }

    fn usage_metadata(&self) -> Option<UsageMetadata> {
        Some(UsageMetadata::new(
            i64::from(self.usage_prompt),
            i64::from(self.usage_completion),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct EmbedRequest {
    pub model: String,
    pub inputs: Vec<String>,
}

impl EmbedRequest {
    pub fn call_context(&self) -> CallContext {
        CallContext::new().arg(self.inputs.clone())
    }
}

impl RequestParams for EmbedRequest {
    fn model(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EmbedResponse {
    pub model: String,
    pub vectors: Vec<Vec<f32>>,
    pub usage: u32,
    pub provider: String,
}

impl Traceable for EmbedResponse {
    // vectors are summarized; the raw floats are not worth a span attribute
    fn to_payload(&self) -> Payload {
        Payload::map([
            ("model", Payload::from(self.model.as_str())),
            ("provider", Payload::from(self.provider.as_str())),
            ("vectors", Payload::from(self.vectors.len() as i64)),
            (
                "dimensions",
                Payload::from(self.vectors.first().map(|v| v.len() as i64)),
            ),
        ])
    }

    fn usage_metadata(&self) -> Option<UsageMetadata> {
        Some(UsageMetadata::new(i64::from(self.usage), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::to_json_string;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "command-r".to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "Hello".to_string(),
            }],
            temperature: Some(0.5),
            top_p: Some(0.9),
            top_k: Some(40),
            max_output_tokens: Some(256),
            stop_sequences: Some(vec!["\n\n".to_string()]),
            metadata: None,
            request_id: Some("req-123".to_string()),
        }
    }

    #[test]
    fn chat_request_roundtrip() {
        let req = request();
        let json = serde_json::to_string(&req).unwrap();
        let de: ChatRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, de);
    }

    #[test]
    fn chat_request_optional_fields_default() {
        let de: ChatRequest = serde_json::from_str(r#"{"model":"m","messages":[]}"#).unwrap();
        assert_eq!(de.temperature, None);
        assert_eq!(de.top_k, None);
    }

    #[test]
    fn role_json_roundtrip_lowercase() {
        let json = r#"{"role":"assistant","content":"ok"}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        let back = serde_json::to_string(&msg).unwrap();
        assert!(back.contains("\"assistant\""));
    }

    #[test]
    fn chat_request_exposes_request_params() {
        let req = request();
        assert_eq!(req.model().as_deref(), Some("command-r"));
        assert_eq!(req.max_output_tokens(), Some(256));
        assert_eq!(req.top_k(), Some(40));
        assert_eq!(req.temperature(), Some(0.5));
    }

    #[test]
    fn chat_call_context_splits_messages_and_options() {
        let call = request().call_context();
        assert_eq!(
            to_json_string(&call.args_payload()),
            r#"[[{"role": "user", "content": "Hello"}]]"#
        );
        // blank stop sequence and missing metadata are dropped
        assert_eq!(to_json_string(&call.kwargs_payload()), r#"{"request_id": "req-123"}"#);
    }

    #[test]
    fn chat_response_reports_usage() {
        let resp = ChatResponse {
            model: "command-r".to_string(),
            text: "Hello back".to_string(),
            usage_prompt: 10,
            usage_completion: 20,
            provider: "null".to_string(),
            provider_request_id: None,
            created_at_ms: 0,
            latency_ms: 0,
        };
        assert_eq!(resp.usage_metadata(), Some(UsageMetadata::new(10, 20)));
        let json = serde_json::to_string(&resp).unwrap();
        let de: ChatResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, de);
    }

    #[test]
    fn embed_response_payload_is_a_summary() {
        let resp = EmbedResponse {
            model: "embed-english-v3.0".to_string(),
            vectors: vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]],
            usage: 2,
            provider: "null".to_string(),
        };
        assert_eq!(
            to_json_string(&resp.to_payload()),
            r#"{"model": "embed-english-v3.0", "provider": "null", "vectors": 2, "dimensions": 3}"#
        );
        assert_eq!(resp.usage_metadata(), Some(UsageMetadata::new(2, 0)));
    }
}
