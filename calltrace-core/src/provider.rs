use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CallTraceError, CoreResult};
use crate::interceptor::Interceptor;
use crate::model::{ChatRequest, ChatResponse, EmbedRequest, EmbedResponse};
use crate::registry::InterceptorSet;

/// Capability marker for providers.
/// Used to advertise what verbs a provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Chat,
    Embed,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse>;
}

#[async_trait]
pub trait EmbedProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn embed(&self, req: EmbedRequest) -> CoreResult<EmbedResponse>;
}

/// Providers can expose their supported capabilities
pub trait ProviderCaps {
    fn capabilities(&self) -> &'static [Capability];
}

/// A dummy provider implementation that always returns canned responses.
/// Useful for tests or as a placeholder.
pub struct NullProvider;

#[async_trait]
impl ChatProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse> {
        if req.messages.is_empty() {
            return Err(CallTraceError::Validation("chat request has no messages".into()));
        }
        Ok(ChatResponse {
            model: req.model,
            text: "[null provider response]".into(),
            usage_prompt: req.messages.iter().map(|m| m.content.len() as u32).sum(),
            usage_completion: 0,
            provider: "null".into(),
            provider_request_id: None,
            created_at_ms: 0,
            latency_ms: 0,
        })
    }
}

#[async_trait]
impl EmbedProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn embed(&self, req: EmbedRequest) -> CoreResult<EmbedResponse> {
        Ok(EmbedResponse {
            model: req.model,
            vectors: req.inputs.iter().map(|_| vec![0.0_f32; 3]).collect(),
            usage: req.inputs.len() as u32,
            provider: "null".into(),
        })
    }
}

impl ProviderCaps for NullProvider {
    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::Chat, Capability::Embed]
    }
}

/// Provider wrapper that routes `chat` / `embed` through an interceptor.
///
/// Verbs without an interceptor go straight to the inner provider.
pub struct Traced<P> {
    inner: P,
    chat: Option<Arc<Interceptor>>,
    embed: Option<Arc<Interceptor>>,
}

impl<P> Traced<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            chat: None,
            embed: None,
        }
    }

    /// Wire both verbs from an instrumented set; missing keys leave the verb untraced.
    pub fn from_set(inner: P, set: &InterceptorSet, chat_key: &str, embed_key: &str) -> Self {
        Self {
            inner,
            chat: set.get(chat_key),
            embed: set.get(embed_key),
        }
    }

    pub fn with_chat_interceptor(mut self, interceptor: Arc<Interceptor>) -> Self {
        self.chat = Some(interceptor);
        self
    }

    pub fn with_embed_interceptor(mut self, interceptor: Arc<Interceptor>) -> Self {
        self.embed = Some(interceptor);
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ChatProvider> ChatProvider for Traced<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, req: ChatRequest) -> CoreResult<ChatResponse> {
        let Some(interceptor) = &self.chat else {
            return self.inner.chat(req).await;
        };
        let call = req.call_context();
        let params = req.clone();
        interceptor.invoke_async(&params, &call, self.inner.chat(req)).await
    }
}

#[async_trait]
impl<P: EmbedProvider> EmbedProvider for Traced<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, req: EmbedRequest) -> CoreResult<EmbedResponse> {
        let Some(interceptor) = &self.embed else {
            return self.inner.embed(req).await;
        };
        let call = req.call_context();
        let params = req.clone();
        interceptor.invoke_async(&params, &call, self.inner.embed(req)).await
    }
}

impl<P: ProviderCaps> ProviderCaps for Traced<P> {
    fn capabilities(&self) -> &'static [Capability] {
        self.inner.capabilities()
    }
}
