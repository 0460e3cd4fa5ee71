//! Graph documents on disk.
//!
//! A [GraphDocument] is stored as pretty-printed JSON with camelCase keys, the
//! same shape [crate::externalize] produces and [crate::internalize] reads.

use crate::error::Result;
use crate::persistence::GraphDocument;
use std::path::Path;
use tracing::{debug, instrument};

/// Conventional file name of a saved graph inside a project directory.
pub const GRAPH_FILENAME: &str = "graph.json";

/// Stores an externalized graph at `path`. Missing parent directories are created.
#[instrument(level = "trace", skip(path, doc), fields(path = %path.display()))]
pub fn save_graph(path: &Path, doc: &GraphDocument) -> Result<()> {
  if let Some(dir) = path.parent() {
    std::fs::create_dir_all(dir)?;
  }
  std::fs::write(path, serde_json::to_vec_pretty(doc)?)?;
  debug!(transforms = doc.transforms.len(), connections = doc.connections.len(), "graph saved");
  Ok(())
}

/// Parses the graph document at `path`. An unreadable file is an `Io` error,
/// malformed JSON a `Serialization` error.
#[instrument(level = "trace", skip(path), fields(path = %path.display()))]
pub fn load_graph(path: &Path) -> Result<GraphDocument> {
  let doc: GraphDocument = serde_json::from_slice(&std::fs::read(path)?)?;
  debug!(transforms = doc.transforms.len(), "graph loaded");
  Ok(doc)
}
