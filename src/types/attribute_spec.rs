//! Attribute declarations: name plus behavioural flags.

use serde::{Deserialize, Serialize};

/// Conventional data input of pass-through transforms.
pub const INPUT: &str = "INPUT";
/// Conventional data output of pass-through transforms.
pub const OUTPUT: &str = "OUTPUT";
/// Reserved attribute: any value written here aborts the graph.
pub const ABORT: &str = "ABORT";
/// Reserved attribute: a truthy value turns on per-delivery debug logging.
pub const DEBUG: &str = "DEBUG";

/// Behavioural flags of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeFlags {
  /// Must hold a value or have an incoming connection before execution.
  pub required: bool,
  /// Must be connected somewhere; an unconnected one becomes the graph output.
  pub requires_outbound_connection: bool,
  /// Values set before activation are held in a source until the node starts.
  pub deferred: bool,
  /// Carries a chunk sequence terminated by the null marker.
  pub stream: bool,
  /// Written out when the graph is externalized.
  pub externalize: bool,
  /// May be set from outside once the graph is running.
  pub allow_external_mutation_while_running: bool,
}

/// Declaration of one attribute a transform exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
  pub name: String,
  pub flags: AttributeFlags,
}

impl AttributeSpec {
  /// A plain, externalized attribute with no other flags.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      flags: AttributeFlags {
        externalize: true,
        ..AttributeFlags::default()
      },
    }
  }

  pub fn required(mut self) -> Self {
    self.flags.required = true;
    self
  }

  pub fn requires_outbound_connection(mut self) -> Self {
    self.flags.requires_outbound_connection = true;
    self
  }

  pub fn deferred(mut self) -> Self {
    self.flags.deferred = true;
    self
  }

  pub fn stream(mut self) -> Self {
    self.flags.stream = true;
    self
  }

  pub fn transient(mut self) -> Self {
    self.flags.externalize = false;
    self
  }

  pub fn mutable_while_running(mut self) -> Self {
    self.flags.allow_external_mutation_while_running = true;
    self
  }

  /// The `INPUT` stream every pass-through transform reads.
  pub fn input() -> Self {
    Self::new(INPUT)
      .required()
      .deferred()
      .stream()
      .transient()
      .mutable_while_running()
  }

  /// The `OUTPUT` stream every pass-through transform writes.
  pub fn output() -> Self {
    Self::new(OUTPUT)
      .requires_outbound_connection()
      .stream()
      .transient()
  }

  /// `INPUT` + `OUTPUT`.
  pub fn pass_through() -> Vec<Self> {
    vec![Self::input(), Self::output()]
  }

  /// `ABORT` and `DEBUG`, present on every node.
  pub(crate) fn reserved() -> Vec<Self> {
    vec![
      Self::new(ABORT).transient().mutable_while_running(),
      Self::new(DEBUG).transient().mutable_while_running(),
    ]
  }
}
