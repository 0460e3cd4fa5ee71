//! Built-in transform bodies.

mod base64_codec;
#[cfg(test)]
mod base64_codec_test;
mod collect;
#[cfg(test)]
mod collect_test;
mod custom;
#[cfg(test)]
mod custom_test;
mod pass_through;

pub use base64_codec::{Base64Decode, Base64Encode};
pub use collect::Collect;
pub use custom::{CustomTransform, CustomTransformBuilder};
pub use pass_through::PassThrough;
