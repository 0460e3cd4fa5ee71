//! # transform-graph
//!
//! A concurrent dataflow engine. Typed attributes of nodes are wired into a
//! directed graph; values travel node to node through one serial queue per
//! attribute, nodes can hold a value back until a sibling attribute arrives
//! (pushback), and any node can abort the whole graph.
//!
//! ## Architecture
//!
//! - [Node] wraps a [Transform] body with its attributes and the
//!   propagation, activation and abort state machine.
//! - [GroupTransform] is the connected component: membership, traversal,
//!   abort broadcast and teardown.
//! - [Node::execute] validates the group, attaches a monitor to the single
//!   unconnected output, activates every node and reports what reaches the
//!   monitor.
//! - [Source]s feed attributes once their node is active.
//! - [persistence] and [graph_io] turn a group into a JSON document and back.

mod attribute;
pub mod config;
mod context;
pub mod error;
#[cfg(test)]
mod error_test;
mod execution;
pub mod graph_io;
mod group;
mod monitor;
#[cfg(test)]
mod monitor_test;
mod node;
pub mod persistence;
#[cfg(test)]
mod persistence_test;
mod queue;
mod registry;
mod source;
#[cfg(test)]
mod source_test;
mod sync;
mod transform;
pub mod transforms;
pub mod types;

pub use config::EngineConfig;
pub use context::NodeContext;
pub use error::{ErrorKind, Result, TransformError};
pub use execution::{ExecutionHandle, execute, execute_with};
pub use group::{GroupTransform, connect};
pub use node::{Node, NodeId};
pub use persistence::{GraphDocument, externalize, internalize, internalize_with_config};
pub use registry::TransformRegistry;
pub use source::{Destination, SingleShotSource, Source, StreamSource};
pub use transform::Transform;
pub use types::{
  ABORT, AttributeFlags, AttributeSpec, AttributeValue, DEBUG, Delivery, INPUT, MetaAttribute,
  OUTPUT, PushbackState, Value,
};
