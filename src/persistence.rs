//! Externalizing a group to a plain document and rebuilding it.
//!
//! A document lists every transform with its per-attribute meta dictionary
//! plus the transform's own export data, then every connection by node name.

use crate::config::EngineConfig;
use crate::error::{Result, TransformError};
use crate::group::GroupTransform;
use crate::monitor::MONITOR_TYPE;
use crate::node::Node;
use crate::registry::TransformRegistry;
use crate::types::{AttributeValue, MetaAttribute, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument, warn};

/// Per-attribute meta dictionaries keyed by attribute name.
pub type AttributeState = BTreeMap<String, BTreeMap<MetaAttribute, serde_json::Value>>;

/// Externalized graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
  pub transforms: Vec<TransformRecord>,
  pub connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRecord {
  pub name: String,
  #[serde(rename = "type")]
  pub type_name: String,
  #[serde(default)]
  pub state: AttributeState,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom_export_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
  pub from_name: String,
  pub from_attr: String,
  pub to_name: String,
  pub to_attr: String,
}

/// Writes out every member of `group` (the monitor of a running graph excluded).
#[instrument(level = "trace", skip_all, fields(group = %group.id()))]
pub async fn externalize(group: &GroupTransform) -> Result<GraphDocument> {
  let members: Vec<Node> = group
    .members()
    .into_iter()
    .filter(|n| n.type_name() != MONITOR_TYPE)
    .collect();
  let mut doc = GraphDocument::default();
  for node in &members {
    doc.transforms.push(TransformRecord {
      name: node.name(),
      type_name: node.type_name().to_string(),
      state: externalize_attributes(node)?,
      custom_export_data: node.inner.lock_body().await.externalize(),
    });
    for attr in node.inner.attributes() {
      let connections = attr.state().connections.clone();
      for c in connections {
        let Some(target) = group.member(c.node) else {
          continue;
        };
        if target.type_name() == MONITOR_TYPE {
          continue;
        }
        doc.connections.push(ConnectionRecord {
          from_name: node.name(),
          from_attr: attr.name().to_string(),
          to_name: target.name(),
          to_attr: c.attribute,
        });
      }
    }
  }
  debug!(
    transforms = doc.transforms.len(),
    connections = doc.connections.len(),
    "graph externalized"
  );
  Ok(doc)
}

fn externalize_attributes(node: &Node) -> Result<AttributeState> {
  let mut state = AttributeState::new();
  for name in node.attribute_names() {
    if !node.attribute_flags(&name)?.externalize {
      continue;
    }
    let mut meta = BTreeMap::new();
    for tag in MetaAttribute::FLAGS {
      meta.insert(tag, node.get_meta(&name, tag)?);
    }
    if let AttributeValue::Set(v) = node.get_attribute(&name)?
      && !v.is_error()
    {
      meta.insert(MetaAttribute::Value, serde_json::to_value(&v)?);
    }
    state.insert(name, meta);
  }
  Ok(state)
}

/// Rebuilds a graph with default engine settings.
pub async fn internalize(doc: &GraphDocument, registry: &TransformRegistry) -> Result<GroupTransform> {
  internalize_with_config(doc, registry, EngineConfig::default()).await
}

/// Creates each transform through `registry`, restores its attributes and
/// export data, then replays the connections. On failure the partly built
/// group is disposed.
#[instrument(level = "trace", skip_all)]
pub async fn internalize_with_config(
  doc: &GraphDocument,
  registry: &TransformRegistry,
  config: EngineConfig,
) -> Result<GroupTransform> {
  let group = GroupTransform::with_config(config)?;
  if let Err(e) = populate(doc, registry, &group).await {
    if let Err(dispose) = group.dispose() {
      warn!(group = %group.id(), error = %dispose, "could not dispose partial graph");
    }
    return Err(e);
  }
  debug!(group = %group.id(), members = group.len(), "graph internalized");
  Ok(group)
}

async fn populate(doc: &GraphDocument, registry: &TransformRegistry, group: &GroupTransform) -> Result<()> {
  let mut by_name: HashMap<String, Node> = HashMap::new();
  for record in &doc.transforms {
    if by_name.contains_key(&record.name) {
      return Err(TransformError::invalid_input(format!(
        "duplicate transform name '{}'",
        record.name
      )));
    }
    let node = registry.create(&record.type_name)?;
    node.set_name(record.name.clone());
    for (attr, meta) in &record.state {
      if !node.has_attribute(attr) {
        return Err(TransformError::unknown_attribute(&record.name, attr));
      }
      for tag in MetaAttribute::FLAGS {
        if let Some(v) = meta.get(&tag) {
          node.set_meta(attr, tag, v.clone()).await?;
        }
      }
      if let Some(v) = meta.get(&MetaAttribute::Value)
        && !v.is_null()
      {
        let value: Value = serde_json::from_value(v.clone())?;
        node.set_attribute(attr, value).await?;
      }
    }
    if let Some(data) = &record.custom_export_data {
      node.inner.lock_body().await.internalize(data.clone())?;
    }
    group.add_member(&node)?;
    by_name.insert(record.name.clone(), node);
  }
  for c in &doc.connections {
    let lookup = |name: &str| {
      by_name.get(name).ok_or_else(|| {
        TransformError::invalid_connection(format!("connection names unknown transform '{}'", name))
      })
    };
    let from = lookup(&c.from_name)?;
    let to = lookup(&c.to_name)?;
    group.connect(from, &c.from_attr, to, &c.to_attr)?;
  }
  Ok(())
}
