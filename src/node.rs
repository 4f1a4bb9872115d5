//! The format description language: a closed set of node kinds that parse a
//! [`BitStream`] into a [`Value`] and compose a [`Value`] back into bytes.
//!
//! Trees are built once and reused. Parsing and composing never change a
//! tree's shape; the only state a tree carries is the running total of each
//! [`DeltaNode`], which is reset with [`FormatNode::reset_deltas`].
//!
//! ```
//! use bitform::{FormatNode, StructField, Value};
//!
//! let format = FormatNode::structure([
//!     StructField::new("len", FormatNode::integer(8)),
//!     StructField::new("data", FormatNode::blob("len")),
//! ]);
//!
//! let value = format.parse_bytes(&[0x03, b'a', b'b', b'c']).unwrap();
//! assert_eq!(value.get("len"), Some(&Value::U64(3)));
//! assert_eq!(value.get("data"), Some(&Value::from(&b"abc"[..])));
//! ```

use crate::callback::CallbackNode;
use crate::composite::{ArrayNode, StructNode};
use crate::conditional::{ChoiceArm, ChoiceNode, OptionalNode};
use crate::errors::Result;
use crate::field::{Member, StructField};
use crate::scalar::{BlobNode, IntegerNode, SkipNode};
use crate::scope::Scope;
use crate::size::{Condition, Size};
use crate::source::MemoryStream;
use crate::stream::BitStream;
use crate::transform::{DeltaNode, TranslateNode, Translation};
use crate::value::Value;

/// One node of a format tree.
#[derive(Debug, Clone)]
pub enum FormatNode {
    Struct(StructNode),
    Array(ArrayNode),
    Integer(IntegerNode),
    Blob(BlobNode),
    /// A single bit.
    Boolean,
    Optional(OptionalNode),
    Choice(ChoiceNode),
    Delta(DeltaNode),
    Translate(TranslateNode),
    Skip(SkipNode),
    Callback(CallbackNode),
}

impl FormatNode {
    pub fn structure(fields: impl IntoIterator<Item = StructField>) -> Self {
        FormatNode::Struct(StructNode::new(fields))
    }

    pub fn array(size: impl Into<Size>, item: FormatNode) -> Self {
        FormatNode::Array(ArrayNode::new(size, item))
    }

    /// Unsigned big-endian integer `size` bits wide.
    pub fn integer(size: impl Into<Size>) -> Self {
        FormatNode::Integer(IntegerNode::new(size))
    }

    /// Raw bytes, `size` of them.
    pub fn blob(size: impl Into<Size>) -> Self {
        FormatNode::Blob(BlobNode::new(size))
    }

    pub fn boolean() -> Self {
        FormatNode::Boolean
    }

    pub fn optional(condition: impl Into<Condition>, item: FormatNode) -> Self {
        FormatNode::Optional(OptionalNode::new(condition, item))
    }

    pub fn choice(
        selector: FormatNode,
        arms: impl IntoIterator<Item = (Value, ChoiceArm)>,
    ) -> Self {
        FormatNode::Choice(ChoiceNode::new(selector, arms))
    }

    pub fn delta(item: FormatNode) -> Self {
        FormatNode::Delta(DeltaNode::new(item))
    }

    pub fn translate(item: FormatNode, translation: Translation) -> Self {
        FormatNode::Translate(TranslateNode::new(item, translation))
    }

    /// Discards `size` bytes.
    pub fn skip(size: impl Into<Size>) -> Self {
        FormatNode::Skip(SkipNode::new(size))
    }

    pub fn callback<F>(read: F) -> Self
    where
        F: Fn(&mut BitStream<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        FormatNode::Callback(CallbackNode::new(read))
    }

    /// Name of the node kind, for logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FormatNode::Struct(_) => "struct",
            FormatNode::Array(_) => "array",
            FormatNode::Integer(_) => "integer",
            FormatNode::Blob(_) => "blob",
            FormatNode::Boolean => "boolean",
            FormatNode::Optional(_) => "optional",
            FormatNode::Choice(_) => "choice",
            FormatNode::Delta(_) => "delta",
            FormatNode::Translate(_) => "translate",
            FormatNode::Skip(_) => "skip",
            FormatNode::Callback(_) => "callback",
        }
    }

    /// Reads one value described by this node.
    pub fn parse(&self, stream: &mut BitStream<'_>) -> Result<Value> {
        self.parse_in(stream, &Scope::root())
    }

    /// Writes `value` as described by this node.
    pub fn compose(&self, stream: &mut BitStream<'_>, value: &Value) -> Result<()> {
        self.compose_in(stream, value, &Scope::root())
    }

    /// Parses an in-memory byte slice. Trailing bytes are ignored; use a
    /// [`crate::FormatRunner`] to detect them.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Value> {
        let mut stream = BitStream::new(MemoryStream::from_bytes(bytes.to_vec()));
        self.parse(&mut stream)
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        match self {
            FormatNode::Struct(node) => node.parse_in(stream, scope),
            FormatNode::Array(node) => node.parse_in(stream, scope),
            FormatNode::Integer(node) => node.parse_in(stream, scope),
            FormatNode::Blob(node) => node.parse_in(stream, scope),
            FormatNode::Boolean => Ok(Value::Bool(stream.read_bool()?)),
            FormatNode::Optional(node) => node.parse_in(stream, scope),
            FormatNode::Choice(node) => node.parse_in(stream, scope),
            FormatNode::Delta(node) => node.parse_in(stream, scope),
            FormatNode::Translate(node) => node.parse_in(stream, scope),
            FormatNode::Skip(node) => node.parse_in(stream, scope),
            FormatNode::Callback(node) => node.parse_in(stream),
        }
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        match self {
            FormatNode::Struct(node) => node.compose_in(stream, value, scope),
            FormatNode::Array(node) => node.compose_in(stream, value, scope),
            FormatNode::Integer(node) => node.compose_in(stream, value, scope),
            FormatNode::Blob(node) => node.compose_in(stream, value, scope),
            FormatNode::Boolean => stream.write_bool(value.truthy()),
            FormatNode::Optional(node) => node.compose_in(stream, value, scope),
            FormatNode::Choice(node) => node.compose_in(stream, value, scope),
            FormatNode::Delta(node) => node.compose_in(stream, value, scope),
            FormatNode::Translate(node) => node.compose_in(stream, value, scope),
            FormatNode::Skip(node) => node.compose_in(stream, value, scope),
            FormatNode::Callback(node) => node.compose_in(stream, value),
        }
    }

    /// Clears the running total of every delta node in the tree.
    pub fn reset_deltas(&self) {
        match self {
            FormatNode::Struct(node) => {
                for field in &node.fields {
                    if let Member::Node(member) = &field.member {
                        member.reset_deltas();
                    }
                }
            }
            FormatNode::Array(node) => {
                node.size.reset_deltas();
                node.item.reset_deltas();
            }
            FormatNode::Integer(node) => node.size.reset_deltas(),
            FormatNode::Blob(node) => node.size.reset_deltas(),
            FormatNode::Boolean | FormatNode::Callback(_) => {}
            FormatNode::Optional(node) => {
                node.condition.reset_deltas();
                node.item.reset_deltas();
            }
            FormatNode::Choice(node) => {
                node.selector.reset_deltas();
                for (_, arm) in &node.arms {
                    if let ChoiceArm::Node(arm) = arm {
                        arm.reset_deltas();
                    }
                }
            }
            FormatNode::Delta(node) => {
                node.reset();
                node.item.reset_deltas();
            }
            FormatNode::Translate(node) => node.item.reset_deltas(),
            FormatNode::Skip(node) => node.size.reset_deltas(),
        }
    }
}

impl From<StructNode> for FormatNode {
    fn from(value: StructNode) -> Self {
        FormatNode::Struct(value)
    }
}

impl From<ArrayNode> for FormatNode {
    fn from(value: ArrayNode) -> Self {
        FormatNode::Array(value)
    }
}

impl From<IntegerNode> for FormatNode {
    fn from(value: IntegerNode) -> Self {
        FormatNode::Integer(value)
    }
}

impl From<BlobNode> for FormatNode {
    fn from(value: BlobNode) -> Self {
        FormatNode::Blob(value)
    }
}

impl From<SkipNode> for FormatNode {
    fn from(value: SkipNode) -> Self {
        FormatNode::Skip(value)
    }
}

impl From<CallbackNode> for FormatNode {
    fn from(value: CallbackNode) -> Self {
        FormatNode::Callback(value)
    }
}
