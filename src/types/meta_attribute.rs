//! Meta attribute tags used by `Node::get_meta` / `Node::set_meta` and the persisted form.

use serde::{Deserialize, Serialize};

/// Addressable facet of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaAttribute {
  Value,
  Name,
  Required,
  RequiresOutboundConnection,
  Deferred,
  Stream,
  Externalize,
  AllowExternalMutationWhileRunning,
  HasOutboundConnections,
  HasInboundConnection,
}

impl MetaAttribute {
  /// Tags derived from the graph topology or identity; they cannot be written.
  pub fn is_read_only(self) -> bool {
    matches!(
      self,
      MetaAttribute::Name | MetaAttribute::HasOutboundConnections | MetaAttribute::HasInboundConnection
    )
  }

  /// Flag tags restored from a persisted state dictionary.
  pub const FLAGS: [MetaAttribute; 6] = [
    MetaAttribute::Required,
    MetaAttribute::RequiresOutboundConnection,
    MetaAttribute::Deferred,
    MetaAttribute::Stream,
    MetaAttribute::Externalize,
    MetaAttribute::AllowExternalMutationWhileRunning,
  ];
}
