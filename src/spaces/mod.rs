//! Spaces Module
//!
//! Action/observation space model and the JSON codec used on the wire.

pub mod codec;
pub mod types;

pub use codec::{decode, describe, encode, json_number, parse_descriptor};
pub use types::{box_size, Space, SpaceValue};
