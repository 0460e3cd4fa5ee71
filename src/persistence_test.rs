//! Tests for externalizing and internalizing graphs.

use crate::error::ErrorKind;
use crate::group::connect;
use crate::node::Node;
use crate::persistence::{ConnectionRecord, GraphDocument, TransformRecord, externalize, internalize};
use crate::registry::TransformRegistry;
use crate::transforms::{Base64Encode, Collect, CustomTransform};
use crate::types::{AttributeSpec, AttributeValue, INPUT, MetaAttribute, OUTPUT, Value};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn keyed(imported: Arc<Mutex<Vec<serde_json::Value>>>) -> CustomTransform {
  CustomTransform::builder("keyed")
    .attribute(AttributeSpec::new("KEY").required())
    .externalize(|| Some(json!({"version": 2})))
    .internalize(move |data| {
      imported.lock().unwrap().push(data);
      Ok(())
    })
    .build()
}

fn registry(imported: &Arc<Mutex<Vec<serde_json::Value>>>) -> TransformRegistry {
  let mut r = TransformRegistry::with_builtins();
  let imported = Arc::clone(imported);
  r.register("keyed", move || keyed(Arc::clone(&imported)));
  r
}

fn record(name: &str, type_name: &str) -> TransformRecord {
  TransformRecord {
    name: name.to_string(),
    type_name: type_name.to_string(),
    state: Default::default(),
    custom_export_data: None,
  }
}

#[tokio::test]
async fn externalize_writes_flags_values_and_connections() {
  let imported = Arc::new(Mutex::new(Vec::new()));
  let k = Node::new(keyed(Arc::clone(&imported)));
  k.set_name("k");
  k.set_attribute("KEY", Value::from("secret")).await.unwrap();
  let c = Node::new(Collect::new());
  c.set_name("c");
  let g = connect(&k, OUTPUT, &c, INPUT).unwrap();

  let doc = externalize(&g).await.unwrap();
  assert_eq!(doc.transforms.len(), 2);
  let k_rec = doc.transforms.iter().find(|t| t.name == "k").unwrap();
  assert_eq!(k_rec.type_name, "keyed");
  assert_eq!(k_rec.custom_export_data, Some(json!({"version": 2})));
  let key = &k_rec.state["KEY"];
  assert_eq!(key[&MetaAttribute::Required], json!(true));
  assert_eq!(key[&MetaAttribute::Value], json!({"type": "text", "value": "secret"}));
  assert!(!k_rec.state.contains_key(INPUT), "transient attributes are skipped");
  assert!(!k_rec.state.contains_key("ABORT"));

  assert_eq!(
    doc.connections,
    vec![ConnectionRecord {
      from_name: "k".into(),
      from_attr: OUTPUT.into(),
      to_name: "c".into(),
      to_attr: INPUT.into(),
    }]
  );
  g.dispose().unwrap();
}

#[tokio::test]
async fn internalize_restores_values_connections_and_export_data() {
  let imported = Arc::new(Mutex::new(Vec::new()));
  let k = Node::new(keyed(Arc::clone(&imported)));
  k.set_name("k");
  k.set_attribute("KEY", Value::from("secret")).await.unwrap();
  let c = Node::new(Collect::new());
  c.set_name("c");
  let g = connect(&k, OUTPUT, &c, INPUT).unwrap();
  let doc = externalize(&g).await.unwrap();
  g.dispose().unwrap();

  let restored = internalize(&doc, &registry(&imported)).await.unwrap();
  assert_eq!(restored.len(), 2);
  let k2 = restored.node_by_name("k").unwrap();
  let c2 = restored.node_by_name("c").unwrap();
  assert_ne!(k2, k);
  assert_eq!(
    k2.get_attribute("KEY").unwrap(),
    AttributeValue::Set(Value::from("secret"))
  );
  assert_eq!(
    c2.get_meta(INPUT, MetaAttribute::HasInboundConnection).unwrap(),
    json!(true)
  );
  assert_eq!(*imported.lock().unwrap(), vec![json!({"version": 2})]);
  assert_eq!(externalize(&restored).await.unwrap(), doc);
  restored.dispose().unwrap();
}

#[tokio::test]
async fn restored_flags_apply_before_the_value() {
  let imported = Arc::new(Mutex::new(Vec::new()));
  let mut rec = record("k", "keyed");
  rec.state.insert(
    "KEY".into(),
    [
      (MetaAttribute::Deferred, json!(true)),
      (MetaAttribute::Value, json!({"type": "text", "value": "later"})),
    ]
    .into_iter()
    .collect(),
  );
  let doc = GraphDocument {
    transforms: vec![rec],
    connections: vec![],
  };
  let g = internalize(&doc, &registry(&imported)).await.unwrap();
  let k = g.node_by_name("k").unwrap();
  assert_eq!(k.get_attribute("KEY").unwrap(), AttributeValue::Deferred);
  g.dispose().unwrap();
}

#[tokio::test]
async fn internalize_rejects_bad_documents() {
  let imported = Arc::new(Mutex::new(Vec::new()));
  let reg = registry(&imported);

  let doc = GraphDocument {
    transforms: vec![record("x", "nonexistent")],
    connections: vec![],
  };
  assert_eq!(internalize(&doc, &reg).await.unwrap_err().kind, ErrorKind::UnknownType);

  let doc = GraphDocument {
    transforms: vec![record("a", "identity"), record("a", "collect")],
    connections: vec![],
  };
  assert_eq!(internalize(&doc, &reg).await.unwrap_err().kind, ErrorKind::InvalidInput);

  let doc = GraphDocument {
    transforms: vec![record("a", "identity")],
    connections: vec![ConnectionRecord {
      from_name: "a".into(),
      from_attr: OUTPUT.into(),
      to_name: "ghost".into(),
      to_attr: INPUT.into(),
    }],
  };
  assert_eq!(
    internalize(&doc, &reg).await.unwrap_err().kind,
    ErrorKind::InvalidConnection
  );

  let mut rec = record("a", "identity");
  rec.state.insert("NOPE".into(), Default::default());
  let doc = GraphDocument {
    transforms: vec![rec],
    connections: vec![],
  };
  assert_eq!(
    internalize(&doc, &reg).await.unwrap_err().kind,
    ErrorKind::UnknownAttribute
  );
}

#[tokio::test]
async fn internalized_graph_executes() {
  let doc: GraphDocument = serde_json::from_value(json!({
    "transforms": [
      {
        "name": "enc",
        "type": Base64Encode::TYPE,
        "state": { "INPUT": { "value": { "type": "text", "value": "abc" } } }
      },
      { "name": "col", "type": Collect::TYPE }
    ],
    "connections": [
      { "fromName": "enc", "fromAttr": "OUTPUT", "toName": "col", "toAttr": "INPUT" }
    ]
  }))
  .unwrap();
  let g = internalize(&doc, &TransformRegistry::with_builtins()).await.unwrap();
  let out = crate::execution::execute(&g).await.unwrap();
  assert_eq!(out, Some(Value::from("YWJj")));
}

#[tokio::test]
async fn failed_internalize_releases_created_nodes() {
  let tracker = Arc::new(());
  let mut reg = TransformRegistry::with_builtins();
  let held = Arc::clone(&tracker);
  reg.register("tracked", move || {
    let held = Arc::clone(&held);
    CustomTransform::builder("tracked")
      .finalize(move |_| {
        let _ = &held;
      })
      .build()
  });
  let doc = GraphDocument {
    transforms: vec![record("t", "tracked")],
    connections: vec![ConnectionRecord {
      from_name: "t".into(),
      from_attr: OUTPUT.into(),
      to_name: "ghost".into(),
      to_attr: INPUT.into(),
    }],
  };
  let err = internalize(&doc, &reg).await.unwrap_err();
  assert_eq!(err.kind, ErrorKind::InvalidConnection);
  assert_eq!(Arc::strong_count(&tracker), 2);
}

#[tokio::test]
async fn zero_sized_config_is_rejected_before_building() {
  let reg = TransformRegistry::with_builtins();
  let doc = GraphDocument {
    transforms: vec![record("a", "identity")],
    connections: vec![],
  };
  let config = crate::config::EngineConfig {
    queue_capacity: 0,
    ..Default::default()
  };
  let err = crate::persistence::internalize_with_config(&doc, &reg, config)
    .await
    .unwrap_err();
  assert_eq!(err.kind, ErrorKind::InvalidInput);
}
