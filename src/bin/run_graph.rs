//! CLI: run a saved transform graph over a file or stdin.
//!
//! Loads a graph document, rebuilds it with the built-in transforms, streams
//! the input into the one node whose `INPUT` is not fed by another node, and
//! writes the graph's final value to stdout.
//!
//! Usage: `run_graph [OPTIONS] <graph.json>`
//!
//! Set RUST_LOG=transform_graph=trace for per-value tracing.

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use tokio::io::AsyncRead;
use transform_graph::config::{
  DEFAULT_CHUNK_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SET_TIMEOUT_MS,
};
use transform_graph::{
  EngineConfig, GroupTransform, INPUT, MetaAttribute, Node, StreamSource, TransformRegistry, Value,
  graph_io, internalize_with_config,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run a saved transform graph.
#[derive(Parser, Debug)]
#[command(name = "run_graph")]
#[command(after_help = r#"Environment variables (override the matching flags when set):
  TRANSFORM_QUEUE_CAPACITY   Capacity of every attribute queue.
  TRANSFORM_SET_TIMEOUT_MS   Handoff time before the deadlock warning.
  TRANSFORM_CHUNK_SIZE       Read size of the input stream.

Examples:
  run_graph --input secret.txt encode.json
  cat data.b64 | run_graph decode.json"#)]
struct Args {
  /// Capacity of every attribute queue.
  #[arg(long, value_name = "N", default_value_t = DEFAULT_QUEUE_CAPACITY)]
  queue_capacity: usize,

  /// Bytes per input chunk.
  #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
  chunk_size: usize,

  /// Milliseconds before a slow attribute handoff is reported.
  #[arg(long, value_name = "N", default_value_t = DEFAULT_SET_TIMEOUT_MS)]
  set_timeout_ms: u64,

  /// Input file. Defaults to stdin.
  #[arg(long, value_name = "FILE")]
  input: Option<PathBuf>,

  /// Saved graph document
  #[arg(value_name = "graph.json")]
  graph: PathBuf,
}

fn entry_node(group: &GroupTransform) -> Result<Node, String> {
  let mut entries = Vec::new();
  for node in group.members() {
    if !node.has_attribute(INPUT) {
      continue;
    }
    let fed = node
      .get_meta(INPUT, MetaAttribute::HasInboundConnection)
      .map_err(|e| e.to_string())?;
    if fed != serde_json::Value::Bool(true) {
      entries.push(node);
    }
  }
  match entries.len() {
    1 => Ok(entries.remove(0)),
    0 => Err("graph has no node with an unconnected INPUT".to_string()),
    n => Err(format!("graph has {n} nodes with an unconnected INPUT")),
  }
}

fn fail(message: impl std::fmt::Display) -> ! {
  eprintln!("Error: {message}");
  process::exit(1);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  // Env vars override flags.
  let config = EngineConfig {
    queue_capacity: args.queue_capacity,
    set_timeout_ms: args.set_timeout_ms,
    stream_chunk_size: args.chunk_size,
  }
  .overlay(|key| std::env::var(key).ok());
  info!(config = ?config, graph = %args.graph.display(), "run_graph starting");

  let doc = graph_io::load_graph(&args.graph)
    .unwrap_or_else(|e| fail(format!("reading {}: {e}", args.graph.display())));
  let registry = TransformRegistry::with_builtins();
  let chunk_size = config.stream_chunk_size;
  let group = internalize_with_config(&doc, &registry, config)
    .await
    .unwrap_or_else(|e| fail(e));
  let entry = entry_node(&group).unwrap_or_else(|e| fail(e));

  let reader: Box<dyn AsyncRead + Send + Unpin> = match &args.input {
    Some(path) => match tokio::fs::File::open(path).await {
      Ok(f) => Box::new(f),
      Err(e) => fail(format!("opening {}: {e}", path.display())),
    },
    None => Box::new(tokio::io::stdin()),
  };
  if let Err(e) = entry.set_attribute_source(INPUT, StreamSource::new(reader).with_chunk_size(chunk_size)) {
    fail(e);
  }

  match entry.execute().await {
    Ok(value) => {
      let bytes = match &value {
        Some(Value::Number(n)) => n.to_string().into_bytes(),
        Some(Value::Boolean(b)) => b.to_string().into_bytes(),
        Some(v) => v.as_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
        None => Vec::new(),
      };
      let mut out = std::io::stdout().lock();
      if let Err(e) = out.write_all(&bytes).and_then(|_| out.flush()) {
        fail(e);
      }
      info!(bytes = bytes.len(), "graph completed");
    }
    Err(e) => fail(e),
  }
}
