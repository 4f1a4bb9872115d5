//! Struct members and the dotted paths that place their values.

use std::fmt;

use crate::node::FormatNode;
use crate::value::{Fields, Value};

/// Location of a value inside nested maps, written `outer.inner` in text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a dotted key into its segments.
    pub fn parse(key: &str) -> Self {
        Self::new(key.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// Value stored at this path, if every segment exists.
    pub fn get<'v>(&self, fields: &'v Fields) -> Option<&'v Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = fields.get(first)?;
        for segment in rest {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Stores `value` at this path, creating intermediate maps as needed.
    ///
    /// When both the stored value and `value` are maps they are merged, with
    /// keys already present taking precedence.
    pub fn set(&self, fields: &mut Fields, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };

        let mut target = fields;
        for segment in parents {
            let slot = target.entry(segment.clone()).or_insert(Value::Null);
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::Map(Fields::new());
            }
            target = match slot {
                Value::Map(inner) => inner,
                _ => return,
            };
        }

        match (target.get_mut(last), value) {
            (Some(Value::Map(existing)), Value::Map(mut incoming)) => {
                for (key, value) in std::mem::take(existing) {
                    incoming.insert(key, value);
                }
                *existing = incoming;
            }
            (Some(slot), value) => *slot = value,
            (None, value) => {
                target.insert(last.clone(), value);
            }
        }
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        FieldPath::parse(value)
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        FieldPath::parse(&value)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// What a struct member produces: a parsed node or a constant value.
#[derive(Debug, Clone)]
pub enum Member {
    Node(FormatNode),
    /// Consumes nothing on parse and writes nothing on compose.
    Literal(Value),
}

/// One member of a [`crate::composite::StructNode`].
#[derive(Debug, Clone)]
pub struct StructField {
    /// Where the member's value is stored. Unkeyed members are parsed for
    /// their side effects and dropped from the result.
    pub key: Option<FieldPath>,
    pub member: Member,
}

impl StructField {
    pub fn new(key: impl Into<FieldPath>, node: FormatNode) -> Self {
        Self {
            key: Some(key.into()),
            member: Member::Node(node),
        }
    }

    /// Member that is parsed but not kept.
    pub fn unkeyed(node: FormatNode) -> Self {
        Self {
            key: None,
            member: Member::Node(node),
        }
    }

    /// Constant member stored under `key`.
    pub fn literal(key: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Self {
            key: Some(key.into()),
            member: Member::Literal(value.into()),
        }
    }
}
