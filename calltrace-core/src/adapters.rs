//! Built-in adapter tables: which methods of which library get an interceptor.

use serde::{Deserialize, Serialize};

use crate::attributes::ProviderIdentity;
use crate::interceptor::Variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Orchestration library; `service.type` is `"framework"`.
    Framework,
    /// Model or vector-store client; `service.type` is the provider name.
    Provider,
}

/// One instrumented method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterTarget {
    /// Module path, e.g. `cohere.client`.
    pub module: String,
    /// Attribute path inside the module, e.g. `Client.chat`.
    pub method: String,
    /// Method label used as the span name.
    pub label: String,
    pub task: String,
    pub trace_input: bool,
    pub trace_output: bool,
    pub variant: Variant,
}

impl AdapterTarget {
    pub fn new(module: &str, method: &str, label: &str, task: &str) -> Self {
        Self {
            module: module.to_string(),
            method: method.to_string(),
            label: label.to_string(),
            task: task.to_string(),
            trace_input: true,
            trace_output: true,
            variant: Variant::Generic,
        }
    }

    pub fn composite(mut self) -> Self {
        self.variant = Variant::Composite;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.trace_output = false;
        self
    }

    /// Registry key: `module.method`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.module, self.method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adapter {
    /// Name used in configuration, e.g. `aws_bedrock`.
    pub provider: String,
    /// Human-facing name written to `service.name`.
    pub service_name: String,
    pub kind: AdapterKind,
    /// Reported as `service.version` when the configuration names none.
    pub default_version: String,
    pub targets: Vec<AdapterTarget>,
}

impl Adapter {
    pub fn identity(&self, version: Option<&str>, sdk_name: &str) -> ProviderIdentity {
        let version = version.unwrap_or(&self.default_version);
        let identity = match self.kind {
            AdapterKind::Framework => ProviderIdentity::framework(&self.service_name, version),
            AdapterKind::Provider => {
                let mut id = ProviderIdentity::provider(&self.service_name, version);
                id.service_type = self.provider.clone();
                id
            }
        };
        identity.with_sdk_name(sdk_name)
    }
}

fn adapter(provider: &str, service_name: &str, kind: AdapterKind, version: &str, targets: Vec<AdapterTarget>) -> Adapter {
    Adapter {
        provider: provider.to_string(),
        service_name: service_name.to_string(),
        kind,
        default_version: version.to_string(),
        targets,
    }
}

pub fn langchain_core() -> Adapter {
    let generic = |module: &str, method: &str, task: &str| {
        AdapterTarget::new(module, method, &format!("{module}.{method}"), task)
    };
    adapter(
        "langchain_core",
        "Langchain Core",
        AdapterKind::Framework,
        "0.1.0",
        vec![
            generic("langchain_core.language_models.chat_models", "BaseChatModel.invoke", "invoke"),
            generic("langchain_core.language_models.chat_models", "BaseChatModel.ainvoke", "ainvoke"),
            generic("langchain_core.language_models.llms", "BaseLLM.invoke", "invoke"),
            generic("langchain_core.retrievers", "BaseRetriever.invoke", "retriever"),
            generic("langchain_core.prompts.chat", "ChatPromptTemplate.format_messages", "format_messages"),
            generic("langchain_core.output_parsers.string", "StrOutputParser.parse", "parse"),
            generic("langchain_core.runnables.base", "RunnableSequence.invoke", "runnablesequence").composite(),
            generic("langchain_core.runnables.base", "RunnableParallel.invoke", "runnableparallel").composite(),
            generic("langchain_core.runnables.passthrough", "RunnablePassthrough.invoke", "runnablepassthrough").composite(),
        ],
    )
}

pub fn langgraph() -> Adapter {
    const MODULE: &str = "langgraph.graph.state";
    let targets = ["add_node", "add_edge", "set_entry_point", "set_finish_point", "add_conditional_edges"]
        .into_iter()
        .map(|name| {
            let method = format!("StateGraph.{name}");
            AdapterTarget::new(MODULE, &method, &format!("{MODULE}.{method}"), name).composite()
        })
        .collect();
    adapter("langgraph", "LangGraph", AdapterKind::Framework, "0.0.39", targets)
}

pub fn cohere() -> Adapter {
    adapter(
        "cohere",
        "Cohere",
        AdapterKind::Provider,
        "5.0.0",
        vec![
            AdapterTarget::new("cohere.client", "Client.chat", "cohere.client.chat", "chat"),
            AdapterTarget::new("cohere.client_v2", "ClientV2.chat", "cohere.client_v2.chat", "chat"),
            AdapterTarget::new("cohere.client_v2", "ClientV2.chat_stream", "cohere.client_v2.chat", "chat_stream"),
            AdapterTarget::new("cohere.client", "Client.chat_stream", "cohere.client.chat_stream", "chat_stream"),
            AdapterTarget::new("cohere.client", "Client.embed", "cohere.client.embed", "embed"),
            AdapterTarget::new("cohere.client_v2", "ClientV2.embed", "cohere.client.embed", "embed"),
            AdapterTarget::new("cohere.client", "Client.rerank", "cohere.client.rerank", "rerank"),
            AdapterTarget::new("cohere.client_v2", "ClientV2.rerank", "cohere.client.rerank", "rerank"),
        ],
    )
}

pub fn pinecone() -> Adapter {
    const MODULE: &str = "pinecone.data.index";
    let targets = ["upsert", "query", "delete", "fetch", "update"]
        .into_iter()
        .map(|op| AdapterTarget::new(MODULE, &format!("Index.{op}"), &format!("pinecone.index.{op}"), op))
        .collect();
    adapter("pinecone", "Pinecone", AdapterKind::Provider, "3.1.0", targets)
}

pub fn aws_bedrock() -> Adapter {
    adapter(
        "aws_bedrock",
        "AWS Bedrock",
        AdapterKind::Provider,
        "1.35.31",
        vec![
            // client construction; the returned handle is not serialized
            AdapterTarget::new("boto3", "client", "aws_bedrock.client", "client").without_output(),
            AdapterTarget::new("boto3.session", "Session.client", "aws_bedrock.session.client", "client").without_output(),
        ],
    )
}

/// Every built-in adapter, in registration order.
pub fn builtin() -> Vec<Adapter> {
    vec![langchain_core(), langgraph(), cohere(), pinecone(), aws_bedrock()]
}
