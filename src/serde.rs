//! Serializable format descriptions.
//!
//! These types mirror [`FormatNode`] trees without closures, so a format can
//! be shipped as data (for example a JSON file next to your application) and
//! turned into a tree at runtime, or dumped from a tree for tooling.
//!
//! Callback nodes, computed sizes, callback conditions and function
//! translations have no description; converting a tree that holds one fails
//! with [`Error::Unsupported`].

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::bits::Endian;
use crate::composite::{ArrayNode, StructNode};
use crate::conditional::{ChoiceArm, ChoiceNode, OptionalNode};
use crate::errors::Error;
use crate::field::{FieldPath, Member, StructField};
use crate::node::FormatNode;
use crate::scalar::{BlobNode, IntegerNode, SkipNode};
use crate::size::{Condition, Size};
use crate::transform::{DeltaNode, TranslateNode, Translation};
use crate::value::Value;

/// Description of one node.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum NodeDef {
    Struct {
        fields: Vec<FieldDef>,
        #[serde(default)]
        type_name: Option<String>,
    },
    Array {
        size: SizeDef,
        item: Box<NodeDef>,
    },
    Integer {
        /// Width in bits.
        size: SizeDef,
        #[serde(default)]
        constant: i64,
        #[serde(default)]
        endian: Endian,
        #[serde(default)]
        signed: bool,
    },
    Blob {
        /// Length in bytes.
        size: SizeDef,
        #[serde(default)]
        type_name: Option<String>,
    },
    Boolean,
    Optional {
        condition: ConditionDef,
        item: Box<NodeDef>,
    },
    Choice {
        selector: Box<NodeDef>,
        arms: Vec<ArmDef>,
    },
    Delta {
        item: Box<NodeDef>,
    },
    Translate {
        item: Box<NodeDef>,
        /// `(raw, translated)` pairs.
        table: Vec<(LiteralDef, LiteralDef)>,
    },
    Skip {
        size: SizeDef,
        #[serde(default)]
        align: bool,
    },
}

/// Size expression without closures.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum SizeDef {
    Fixed(usize),
    Node(Box<NodeDef>),
    /// Dotted path of a member read earlier.
    Field(String),
    ToEnd,
}

/// Presence condition without closures.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum ConditionDef {
    Literal(bool),
    Node(Box<NodeDef>),
    Field(String),
}

/// A node or a constant, as used by struct members and choice arms.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum MemberDef {
    Node(NodeDef),
    Literal(LiteralDef),
}

/// One struct member.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FieldDef {
    /// Dotted key; members without one are parsed and dropped.
    #[serde(default)]
    pub key: Option<String>,
    pub member: MemberDef,
}

/// One choice branch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ArmDef {
    pub key: LiteralDef,
    pub arm: MemberDef,
}

/// A [`Value`] as data.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum LiteralDef {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    /// Decimal digits of an integer outside the 64-bit range.
    Big(String),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<LiteralDef>),
    Map(Vec<(String, LiteralDef)>),
    Typed {
        type_name: String,
        inner: Box<LiteralDef>,
    },
}

impl TryFrom<NodeDef> for FormatNode {
    type Error = Error;

    fn try_from(value: NodeDef) -> Result<Self, Self::Error> {
        Ok(match value {
            NodeDef::Struct { fields, type_name } => {
                let fields = fields
                    .into_iter()
                    .map(StructField::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                FormatNode::Struct(StructNode { fields, type_name })
            }
            NodeDef::Array { size, item } => FormatNode::Array(ArrayNode {
                size: size.try_into()?,
                item: Box::new((*item).try_into()?),
            }),
            NodeDef::Integer {
                size,
                constant,
                endian,
                signed,
            } => FormatNode::Integer(IntegerNode {
                size: size.try_into()?,
                constant,
                endian,
                signed,
            }),
            NodeDef::Blob { size, type_name } => FormatNode::Blob(BlobNode {
                size: size.try_into()?,
                type_name,
            }),
            NodeDef::Boolean => FormatNode::Boolean,
            NodeDef::Optional { condition, item } => FormatNode::Optional(OptionalNode {
                condition: condition.try_into()?,
                item: Box::new((*item).try_into()?),
            }),
            NodeDef::Choice { selector, arms } => {
                let arms = arms
                    .into_iter()
                    .map(|arm| {
                        let key = Value::try_from(arm.key)?;
                        let arm = match arm.arm {
                            MemberDef::Node(node) => ChoiceArm::Node(node.try_into()?),
                            MemberDef::Literal(literal) => ChoiceArm::Literal(literal.try_into()?),
                        };
                        Ok((key, arm))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                FormatNode::Choice(ChoiceNode::new((*selector).try_into()?, arms))
            }
            NodeDef::Delta { item } => FormatNode::Delta(DeltaNode::new((*item).try_into()?)),
            NodeDef::Translate { item, table } => {
                let table = table
                    .into_iter()
                    .map(|(raw, translated)| {
                        Ok((Value::try_from(raw)?, Value::try_from(translated)?))
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                FormatNode::Translate(TranslateNode::new(
                    (*item).try_into()?,
                    Translation::Table(table),
                ))
            }
            NodeDef::Skip { size, align } => FormatNode::Skip(SkipNode {
                size: size.try_into()?,
                align,
            }),
        })
    }
}

impl TryFrom<&FormatNode> for NodeDef {
    type Error = Error;

    fn try_from(value: &FormatNode) -> Result<Self, Self::Error> {
        Ok(match value {
            FormatNode::Struct(node) => NodeDef::Struct {
                fields: node
                    .fields
                    .iter()
                    .map(FieldDef::try_from)
                    .collect::<Result<_, _>>()?,
                type_name: node.type_name.clone(),
            },
            FormatNode::Array(node) => NodeDef::Array {
                size: (&node.size).try_into()?,
                item: Box::new(node.item.as_ref().try_into()?),
            },
            FormatNode::Integer(node) => NodeDef::Integer {
                size: (&node.size).try_into()?,
                constant: node.constant,
                endian: node.endian,
                signed: node.signed,
            },
            FormatNode::Blob(node) => NodeDef::Blob {
                size: (&node.size).try_into()?,
                type_name: node.type_name.clone(),
            },
            FormatNode::Boolean => NodeDef::Boolean,
            FormatNode::Optional(node) => NodeDef::Optional {
                condition: (&node.condition).try_into()?,
                item: Box::new(node.item.as_ref().try_into()?),
            },
            FormatNode::Choice(node) => NodeDef::Choice {
                selector: Box::new(node.selector.as_ref().try_into()?),
                arms: node
                    .arms
                    .iter()
                    .map(|(key, arm)| {
                        Ok(ArmDef {
                            key: key.try_into()?,
                            arm: match arm {
                                ChoiceArm::Node(node) => MemberDef::Node(node.try_into()?),
                                ChoiceArm::Literal(value) => MemberDef::Literal(value.try_into()?),
                            },
                        })
                    })
                    .collect::<Result<_, Error>>()?,
            },
            FormatNode::Delta(node) => NodeDef::Delta {
                item: Box::new(node.item.as_ref().try_into()?),
            },
            FormatNode::Translate(node) => {
                let Translation::Table(pairs) = &node.translation else {
                    return Err(Error::unsupported(
                        "function translations cannot be described",
                    ));
                };
                NodeDef::Translate {
                    item: Box::new(node.item.as_ref().try_into()?),
                    table: pairs
                        .iter()
                        .map(|(raw, translated)| {
                            Ok((LiteralDef::try_from(raw)?, LiteralDef::try_from(translated)?))
                        })
                        .collect::<Result<_, Error>>()?,
                }
            }
            FormatNode::Skip(node) => NodeDef::Skip {
                size: (&node.size).try_into()?,
                align: node.align,
            },
            FormatNode::Callback(_) => {
                return Err(Error::unsupported("callback nodes cannot be described"));
            }
        })
    }
}

impl TryFrom<FieldDef> for StructField {
    type Error = Error;

    fn try_from(value: FieldDef) -> Result<Self, Self::Error> {
        Ok(StructField {
            key: value.key.map(FieldPath::from),
            member: match value.member {
                MemberDef::Node(node) => Member::Node(node.try_into()?),
                MemberDef::Literal(literal) => Member::Literal(literal.try_into()?),
            },
        })
    }
}

impl TryFrom<&StructField> for FieldDef {
    type Error = Error;

    fn try_from(value: &StructField) -> Result<Self, Self::Error> {
        Ok(FieldDef {
            key: value.key.as_ref().map(ToString::to_string),
            member: match &value.member {
                Member::Node(node) => MemberDef::Node(node.try_into()?),
                Member::Literal(literal) => MemberDef::Literal(literal.try_into()?),
            },
        })
    }
}

impl TryFrom<SizeDef> for Size {
    type Error = Error;

    fn try_from(value: SizeDef) -> Result<Self, Self::Error> {
        Ok(match value {
            SizeDef::Fixed(n) => Size::Fixed(n),
            SizeDef::Node(node) => Size::node((*node).try_into()?),
            SizeDef::Field(path) => Size::field(path),
            SizeDef::ToEnd => Size::ToEnd,
        })
    }
}

impl TryFrom<&Size> for SizeDef {
    type Error = Error;

    fn try_from(value: &Size) -> Result<Self, Self::Error> {
        Ok(match value {
            Size::Fixed(n) => SizeDef::Fixed(*n),
            Size::Node(node) => SizeDef::Node(Box::new(node.as_ref().try_into()?)),
            Size::Field(path) => SizeDef::Field(path.to_string()),
            Size::ToEnd => SizeDef::ToEnd,
            Size::Computed(_) => {
                return Err(Error::unsupported("computed sizes cannot be described"));
            }
        })
    }
}

impl TryFrom<ConditionDef> for Condition {
    type Error = Error;

    fn try_from(value: ConditionDef) -> Result<Self, Self::Error> {
        Ok(match value {
            ConditionDef::Literal(b) => Condition::Literal(b),
            ConditionDef::Node(node) => Condition::node((*node).try_into()?),
            ConditionDef::Field(path) => Condition::field(path),
        })
    }
}

impl TryFrom<&Condition> for ConditionDef {
    type Error = Error;

    fn try_from(value: &Condition) -> Result<Self, Self::Error> {
        Ok(match value {
            Condition::Literal(b) => ConditionDef::Literal(*b),
            Condition::Node(node) => ConditionDef::Node(Box::new(node.as_ref().try_into()?)),
            Condition::Field(path) => ConditionDef::Field(path.to_string()),
            Condition::Callback(_) => {
                return Err(Error::unsupported("callback conditions cannot be described"));
            }
        })
    }
}

impl TryFrom<LiteralDef> for Value {
    type Error = Error;

    fn try_from(value: LiteralDef) -> Result<Self, Self::Error> {
        Ok(match value {
            LiteralDef::Null => Value::Null,
            LiteralDef::Bool(b) => Value::Bool(b),
            LiteralDef::UInt(n) => Value::U64(n),
            LiteralDef::Int(n) => Value::from(n),
            LiteralDef::Big(digits) => Value::big(
                digits
                    .parse::<BigInt>()
                    .map_err(|e| Error::argument(format!("bad integer literal {digits}: {e}")))?,
            ),
            LiteralDef::Float(f) => Value::Float(f),
            LiteralDef::Bytes(bytes) => Value::Bytes(bytes),
            LiteralDef::String(s) => Value::String(s),
            LiteralDef::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            LiteralDef::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| Ok((key, Value::try_from(value)?)))
                    .collect::<Result<_, Error>>()?,
            ),
            LiteralDef::Typed { type_name, inner } => Value::typed(type_name, (*inner).try_into()?),
        })
    }
}

impl TryFrom<&Value> for LiteralDef {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => LiteralDef::Null,
            Value::Bool(b) => LiteralDef::Bool(*b),
            Value::U64(n) => LiteralDef::UInt(*n),
            Value::I64(n) => LiteralDef::Int(*n),
            Value::Big(n) => LiteralDef::Big(n.to_string()),
            Value::Float(f) => LiteralDef::Float(*f),
            Value::Bytes(bytes) => LiteralDef::Bytes(bytes.clone()),
            Value::String(s) => LiteralDef::String(s.clone()),
            Value::Array(items) => LiteralDef::Array(
                items
                    .iter()
                    .map(LiteralDef::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(fields) => LiteralDef::Map(
                fields
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), LiteralDef::try_from(value)?)))
                    .collect::<Result<_, Error>>()?,
            ),
            Value::Typed { type_name, inner } => LiteralDef::Typed {
                type_name: type_name.clone(),
                inner: Box::new(inner.as_ref().try_into()?),
            },
        })
    }
}
