use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use calltrace_core::{
    attributes::AttributeSet,
    config::Config,
    context::{inject_additional_attributes_async, with_root_span_async},
    interceptor::{Interceptor, make_interceptor},
    model::{ChatMessage, ChatRequest, EmbedRequest},
    payload::Payload,
    provider::{ChatProvider, EmbedProvider, NullProvider, Traced},
    registry::{AdapterRegistry, InterceptorSet},
    telemetry::{LogSink, MemorySink, SpanRecord, tracer_for},
    tracer::SharedTracer,
};
use clap::{Parser, Subcommand};
use opentelemetry::trace::Status;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "calltrace CLI smoke tool", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML). Without one, the cohere adapter is enabled.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print finished spans as JSON lines
    #[arg(long, global = true)]
    json: bool,
    /// Extra span attribute, `key=value`; may be repeated
    #[arg(long = "attr", value_parser = parse_attr, global = true)]
    attrs: Vec<(String, String)>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a traced chat request to the null provider
    Chat {
        #[arg(long, default_value = "command-r")]
        model: String,
        #[arg(short, long, help = "Message from the user")]
        message: String,
        #[arg(long)]
        temperature: Option<f64>,
    },
    /// Send a traced embedding request to the null provider
    Embed {
        #[arg(long, default_value = "embed-english-v3.0")]
        model: String,
        #[arg(short, long, required = true, help = "Input text")]
        input: Vec<String>,
    },
    /// Serialize a JSON value the way span attributes are serialized
    Serialize {
        value: String,
    },
    /// List built-in adapters and their targets
    Adapters,
}

fn parse_attr(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(Config::with_adapters(["cohere"])),
    }
}

fn interceptor_for(set: &InterceptorSet, task: &str, tracer: &SharedTracer, cfg: &Config) -> Arc<Interceptor> {
    set.find_task(task).unwrap_or_else(|| {
        tracing::warn!(task, "no configured adapter traces this task; using a generic interceptor");
        Arc::new(make_interceptor(
            format!("null.{task}"),
            task,
            tracer.clone(),
            env!("CARGO_PKG_VERSION"),
            cfg.tracing.trace_input,
            cfg.tracing.trace_output,
        ))
    })
}

fn print_spans(records: Vec<SpanRecord>, json: bool) -> anyhow::Result<()> {
    for rec in records {
        if json {
            println!("{}", serde_json::to_string(&rec)?);
            continue;
        }
        let status = match &rec.status {
            Status::Unset => "unset".to_string(),
            Status::Ok => "ok".to_string(),
            Status::Error { description } => format!("error: {description}"),
        };
        println!("span {} [{}] {}us", rec.name, status, rec.duration_us);
        for (key, value) in rec.attributes.iter() {
            println!("  {key} = {value}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    let memory = MemorySink::new();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(memory.clone())
        .with_simple_exporter(LogSink::new())
        .build();
    let tracer = tracer_for(&provider);
    let registry = AdapterRegistry::builtin();
    let extra: AttributeSet = cli.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    match cli.command {
        Commands::Chat {
            model,
            message,
            temperature,
        } => {
            let set = registry.instrument(tracer.clone(), &cfg)?;
            let provider = Traced::new(NullProvider).with_chat_interceptor(interceptor_for(&set, "chat", &tracer, &cfg));
            let req = ChatRequest {
                model,
                messages: vec![ChatMessage::user(message)],
                temperature,
                ..Default::default()
            };
            let result = inject_additional_attributes_async(
                &extra,
                with_root_span_async(&tracer, "calltrace.chat", provider.chat(req)),
            )
            .await;
            print_spans(memory.take(), cli.json)?;
            let resp = result?;
            println!("{} -> {}", resp.provider, resp.text);
        }
        Commands::Embed { model, input } => {
            let set = registry.instrument(tracer.clone(), &cfg)?;
            let provider = Traced::new(NullProvider).with_embed_interceptor(interceptor_for(&set, "embed", &tracer, &cfg));
            let req = EmbedRequest { model, inputs: input };
            let result = inject_additional_attributes_async(
                &extra,
                with_root_span_async(&tracer, "calltrace.embed", provider.embed(req)),
            )
            .await;
            print_spans(memory.take(), cli.json)?;
            let resp = result?;
            for (i, v) in resp.vectors.iter().enumerate() {
                println!("{} -> dim={}", i, v.len());
            }
        }
        Commands::Serialize { value } => {
            let parsed: serde_json::Value = serde_json::from_str(&value).context("value must be JSON")?;
            println!("{}", cfg.serializer().to_json_string(&Payload::from(parsed)));
        }
        Commands::Adapters => {
            for adapter in registry.adapters() {
                let enabled = cfg.adapters.iter().any(|a| a.provider == adapter.provider && a.enabled);
                println!(
                    "{} ({}, {:?}, default version {}){}",
                    adapter.provider,
                    adapter.service_name,
                    adapter.kind,
                    adapter.default_version,
                    if enabled { " [enabled]" } else { "" }
                );
                for target in &adapter.targets {
                    println!("  {} -> {} ({:?}, task {})", target.key(), target.label, target.variant, target.task);
                }
            }
        }
    }

    if let Err(err) = provider.shutdown() {
        tracing::warn!(error = %err, "tracer provider shutdown failed");
    }
    Ok(())
}
