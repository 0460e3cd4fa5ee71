//! Plain data types shared by the engine: values, attribute declarations,
//! pushback state, meta attribute tags and monitor deliveries.

mod attribute_spec;
mod delivery;
#[cfg(test)]
mod delivery_test;
mod meta_attribute;
mod pushback_state;
#[cfg(test)]
mod pushback_state_test;
mod value;

pub use attribute_spec::{ABORT, AttributeFlags, AttributeSpec, DEBUG, INPUT, OUTPUT};
pub use delivery::Delivery;
pub use meta_attribute::MetaAttribute;
pub use pushback_state::PushbackState;
pub use value::{AttributeValue, Value};
