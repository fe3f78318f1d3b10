use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

use crate::adapters::{self, Adapter};
use crate::config::Config;
use crate::error::{CallTraceError, CoreResult};
use crate::interceptor::Interceptor;
use crate::tracer::SharedTracer;

/// Interceptors built for one configuration, keyed by `module.method`.
#[derive(Debug, Default)]
pub struct InterceptorSet {
    interceptors: BTreeMap<String, Arc<Interceptor>>,
}

impl InterceptorSet {
    pub fn get(&self, key: &str) -> Option<Arc<Interceptor>> {
        self.interceptors.get(key).cloned()
    }

    /// First interceptor (in key order) whose task label is `task`.
    pub fn find_task(&self, task: &str) -> Option<Arc<Interceptor>> {
        self.interceptors.values().find(|ic| ic.task() == task).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.interceptors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Interceptor>)> {
        self.interceptors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

/// Known adapters by configuration name.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Adapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in adapter.
    pub fn builtin() -> Self {
        Self {
            adapters: adapters::builtin(),
        }
    }

    /// Add an adapter, replacing any existing one with the same provider name.
    pub fn register(&mut self, adapter: Adapter) {
        match self.adapters.iter_mut().find(|a| a.provider == adapter.provider) {
            Some(existing) => *existing = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn adapter(&self, provider: &str) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.provider == provider)
    }

    pub fn adapters(&self) -> &[Adapter] {
        &self.adapters
    }

    /// Build one interceptor per enabled target of every configured adapter.
    ///
    /// Fails on an adapter name the registry does not know or an exclude
    /// pattern that does not compile. Nothing is partially returned.
    pub fn instrument(&self, tracer: SharedTracer, cfg: &Config) -> CoreResult<InterceptorSet> {
        let mut set = InterceptorSet::default();
        let serializer = cfg.serializer();
        for adapter_cfg in &cfg.adapters {
            let adapter = self
                .adapter(&adapter_cfg.provider)
                .ok_or_else(|| CallTraceError::UnknownAdapter {
                    provider: adapter_cfg.provider.clone(),
                })?;
            let excludes = compile_excludes(&adapter_cfg.exclude)?;
            if !adapter_cfg.enabled {
                tracing::debug!(provider = %adapter.provider, "adapter disabled");
                continue;
            }

            let identity = adapter.identity(adapter_cfg.version.as_deref(), &cfg.sdk.name);
            for target in &adapter.targets {
                let key = target.key();
                if excludes.iter().any(|re| re.is_match(&key)) {
                    tracing::debug!(%key, "target excluded");
                    continue;
                }
                let interceptor = Interceptor::builder(&target.label, &target.task, tracer.clone())
                    .identity(identity.clone())
                    .trace_input(cfg.tracing.trace_input && target.trace_input)
                    .trace_output(cfg.tracing.trace_output && target.trace_output)
                    .variant(target.variant)
                    .serializer(serializer)
                    .build();
                set.interceptors.insert(key, Arc::new(interceptor));
            }
        }
        Ok(set)
    }
}

fn compile_excludes(patterns: &[String]) -> CoreResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                CallTraceError::Validation(format!("invalid exclude regex '{pattern}': {e}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterKind, AdapterTarget};
    use crate::attributes::NoParams;
    use crate::config::AdapterCfg;
    use crate::interceptor::Variant;
    use crate::payload::{CallContext, Payload};
    use crate::telemetry::keys::*;
    use crate::telemetry::MemorySink;

    fn tracer(sink: &MemorySink) -> SharedTracer {
        sink.tracer()
    }

    #[test]
    fn instruments_every_target_of_configured_adapters() {
        let sink = MemorySink::new();
        let set = AdapterRegistry::builtin()
            .instrument(tracer(&sink), &Config::with_adapters(["cohere", "pinecone"]))
            .unwrap();
        assert_eq!(set.len(), 13);
        let chat = set.get("cohere.client.Client.chat").unwrap();
        assert_eq!(chat.method(), "cohere.client.chat");
        assert_eq!(chat.identity().service_type, "cohere");
        assert_eq!(chat.identity().service_version, "5.0.0");
        assert!(set.get("langgraph.graph.state.StateGraph.add_node").is_none());
        assert_eq!(set.find_task("query").unwrap().method(), "pinecone.index.query");
    }

    #[test]
    fn empty_config_instruments_nothing() {
        let sink = MemorySink::new();
        let set = AdapterRegistry::builtin().instrument(tracer(&sink), &Config::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn exclude_patterns_skip_targets() {
        let sink = MemorySink::new();
        let mut cfg = Config::with_adapters(["cohere"]);
        cfg.adapters[0].exclude = vec!["client_v2".into(), r"\.rerank$".into()];
        let set = AdapterRegistry::builtin().instrument(tracer(&sink), &cfg).unwrap();
        let keys: Vec<_> = set.keys().collect();
        assert_eq!(
            keys,
            vec!["cohere.client.Client.chat", "cohere.client.Client.chat_stream", "cohere.client.Client.embed"]
        );
    }

    #[test]
    fn invalid_exclude_regex_is_a_validation_error() {
        let sink = MemorySink::new();
        let mut cfg = Config::with_adapters(["pinecone"]);
        cfg.adapters[0].exclude = vec!["(unclosed".into()];
        let err = AdapterRegistry::builtin().instrument(tracer(&sink), &cfg).unwrap_err();
        match err {
            CallTraceError::Validation(msg) => assert!(msg.contains("invalid exclude regex")),
            other => panic!("expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        let sink = MemorySink::new();
        let err = AdapterRegistry::builtin()
            .instrument(tracer(&sink), &Config::with_adapters(["openai"]))
            .unwrap_err();
        assert!(matches!(err, CallTraceError::UnknownAdapter { provider } if provider == "openai"));
    }

    #[test]
    fn disabled_adapter_is_skipped() {
        let sink = MemorySink::new();
        let mut cfg = Config::with_adapters(["cohere", "aws_bedrock"]);
        cfg.adapters[0].enabled = false;
        let set = AdapterRegistry::builtin().instrument(tracer(&sink), &cfg).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["boto3.client", "boto3.session.Session.client"]);
    }

    #[test]
    fn config_flags_and_identity_reach_spans() {
        let sink = MemorySink::new();
        let mut cfg = Config::with_adapters(["langgraph"]);
        cfg.sdk.name = "my-service".into();
        cfg.tracing.trace_output = false;
        cfg.adapters[0].version = Some("0.2.0".into());
        let set = AdapterRegistry::builtin().instrument(tracer(&sink), &cfg).unwrap();

        let add_node = set.get("langgraph.graph.state.StateGraph.add_node").unwrap();
        assert_eq!(add_node.variant(), Variant::Composite);
        add_node
            .invoke(&NoParams, &CallContext::new().arg("retrieve"), || Ok::<_, String>(Payload::from("ok")))
            .unwrap();

        let rec = sink.find("langgraph.graph.state.StateGraph.add_node").unwrap();
        assert_eq!(rec.attr_str(KEY_SDK_NAME), Some("my-service"));
        assert_eq!(rec.attr_str(KEY_SERVICE_NAME), Some("LangGraph"));
        assert_eq!(rec.attr_str(KEY_SERVICE_TYPE), Some(SERVICE_TYPE_FRAMEWORK));
        assert_eq!(rec.attr_str(KEY_SERVICE_VERSION), Some("0.2.0"));
        assert_eq!(rec.attr_str(KEY_TASK_NAME), Some("add_node"));
        assert_eq!(rec.attr_str(KEY_CALL_INPUTS), Some(r#"{"input": "retrieve"}"#));
        assert!(!rec.attributes.contains_key(KEY_CALL_OUTPUTS));
    }

    #[test]
    fn register_replaces_by_provider_name() {
        let mut reg = AdapterRegistry::builtin();
        let before = reg.adapters().len();
        reg.register(Adapter {
            provider: "cohere".into(),
            service_name: "Cohere".into(),
            kind: AdapterKind::Provider,
            default_version: "5.9.0".into(),
            targets: vec![AdapterTarget::new("cohere.client", "Client.chat", "cohere.client.chat", "chat")],
        });
        assert_eq!(reg.adapters().len(), before);
        assert_eq!(reg.adapter("cohere").unwrap().targets.len(), 1);

        let mut cfg = Config::default();
        cfg.adapters.push(AdapterCfg::new("cohere"));
        let sink = MemorySink::new();
        let set = reg.instrument(tracer(&sink), &cfg).unwrap();
        assert_eq!(set.get("cohere.client.Client.chat").unwrap().identity().service_version, "5.9.0");
    }
}
