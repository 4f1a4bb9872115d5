//! # bitform
//!
//! Declarative bit-level binary formats.
//!
//! A format is a tree of [`FormatNode`]s: integers of any bit width, byte
//! blobs, booleans, structs and arrays, plus conditional, choice, delta,
//! translation, skip and callback nodes. The same tree parses a
//! [`BitStream`] into a [`Value`] and composes a [`Value`] back into bytes.
//! Sizes and conditions can refer to fields read earlier, so
//! length-prefixed layouts need no code.
//!
//! Bits are consumed least significant first inside each byte. Big-endian
//! reads concatenate chunks most significant first, little-endian reads
//! least significant first.
//!
//! ## Example
//!
//! ```
//! use bitform::{FormatNode, FormatRunner, RunnerConfig, StructField, Value};
//!
//! let format = FormatNode::structure([
//!     StructField::new("version", FormatNode::integer(4)),
//!     StructField::new("flags", FormatNode::integer(4)),
//!     StructField::new("count", FormatNode::integer(8)),
//!     StructField::new("items", FormatNode::array("count", FormatNode::integer(8))),
//! ]);
//! let runner = FormatRunner::with_config(format, RunnerConfig::strict());
//!
//! let value = runner.parse_bytes(&[0x12, 0x02, 0xAA, 0xBB]).unwrap();
//! assert_eq!(value.get("version"), Some(&Value::U64(2)));
//! assert_eq!(value.get("count"), Some(&Value::U64(2)));
//!
//! let bytes = runner.compose_to_vec(&value).unwrap();
//! assert_eq!(bytes, [0x12, 0x02, 0xAA, 0xBB]);
//! ```

pub mod backend;
pub mod bit_buffer;
pub mod bits;
pub mod callback;
pub mod composite;
pub mod conditional;
pub mod errors;
pub mod field;
pub mod node;
pub mod runner;
pub mod scalar;
pub mod scope;
#[cfg(feature = "serde")]
pub mod serde;
pub mod size;
pub mod source;
pub mod stream;
pub mod transform;
pub mod value;

pub use bit_buffer::BitBuffer;
pub use bits::Endian;
pub use callback::CallbackNode;
pub use composite::{ArrayNode, StructNode};
pub use conditional::{ChoiceArm, ChoiceNode, OptionalNode};
pub use errors::{Error, ErrorKind, Result};
pub use field::{FieldPath, Member, StructField};
pub use node::FormatNode;
pub use runner::{FormatRunner, RunnerConfig, TrailingData};
pub use scalar::{BlobNode, IntegerNode, SkipNode};
pub use size::{Condition, Size};
pub use source::{ByteStream, IoStream, MemoryStream};
pub use stream::BitStream;
pub use transform::{DeltaNode, TranslateNode, Translation};
pub use value::{Fields, Value};
