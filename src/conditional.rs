//! Nodes whose layout depends on data read earlier.

use tracing::trace;

use crate::errors::{Error, Result};
use crate::node::FormatNode;
use crate::scope::Scope;
use crate::size::Condition;
use crate::stream::BitStream;
use crate::value::Value;

/// A node that is only present when its condition holds.
///
/// An absent value parses as [`Value::Null`].
#[derive(Debug, Clone)]
pub struct OptionalNode {
    pub condition: Condition,
    pub item: Box<FormatNode>,
}

impl OptionalNode {
    pub fn new(condition: impl Into<Condition>, item: FormatNode) -> Self {
        Self {
            condition: condition.into(),
            item: Box::new(item),
        }
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        if self.condition.evaluate(stream, scope)? {
            self.item.parse_in(stream, scope)
        } else {
            trace!("optional value absent");
            Ok(Value::Null)
        }
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let present = !value.is_null();
        self.condition.compose_presence(stream, present, scope)?;
        if present {
            self.item.compose_in(stream, value, scope)?;
        }
        Ok(())
    }
}

/// Branch taken by a [`ChoiceNode`] for one selector value.
#[derive(Debug, Clone)]
pub enum ChoiceArm {
    Node(FormatNode),
    /// Returned as is, without reading anything further.
    Literal(Value),
}

impl From<FormatNode> for ChoiceArm {
    fn from(value: FormatNode) -> Self {
        ChoiceArm::Node(value)
    }
}

impl From<Value> for ChoiceArm {
    fn from(value: Value) -> Self {
        ChoiceArm::Literal(value)
    }
}

/// Picks a branch by a selector value parsed from the stream.
#[derive(Debug, Clone)]
pub struct ChoiceNode {
    pub selector: Box<FormatNode>,
    pub arms: Vec<(Value, ChoiceArm)>,
}

impl ChoiceNode {
    pub fn new(selector: FormatNode, arms: impl IntoIterator<Item = (Value, ChoiceArm)>) -> Self {
        Self {
            selector: Box::new(selector),
            arms: arms.into_iter().collect(),
        }
    }

    /// Arm registered for `key`. Integer-valued keys match across
    /// representations, so a boolean selector finds arms keyed `0` and `1`.
    pub fn arm(&self, key: &Value) -> Option<&ChoiceArm> {
        let wanted = integer_key(key);
        self.arms.iter().find_map(|(candidate, arm)| {
            let matches =
                candidate == key || (wanted.is_some() && integer_key(candidate) == wanted);
            matches.then_some(arm)
        })
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let key = self.selector.parse_in(stream, scope)?;
        trace!(selector = %key, "choice selector");
        match self.arm(&key) {
            Some(ChoiceArm::Node(node)) => node.parse_in(stream, scope),
            Some(ChoiceArm::Literal(value)) => Ok(value.clone()),
            None => Err(Error::UnknownChoice {
                key: key.to_string(),
                choices: self.arms.iter().map(|(key, _)| key.to_string()).collect(),
            }),
        }
    }

    pub(crate) fn compose_in(
        &self,
        _stream: &mut BitStream<'_>,
        _value: &Value,
        _scope: &Scope<'_>,
    ) -> Result<()> {
        Err(Error::unsupported(
            "a choice cannot recover its selector from the chosen value",
        ))
    }
}

fn integer_key(value: &Value) -> Option<i128> {
    match value {
        Value::Bool(_) | Value::U64(_) | Value::I64(_) | Value::Big(_) => value.to_i128(),
        Value::Typed { inner, .. } => integer_key(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::field::StructField;
    use crate::source::MemoryStream;

    fn compose(node: &FormatNode, value: &Value) -> Result<Vec<u8>> {
        let mut sink = MemoryStream::new();
        {
            let mut stream = BitStream::new(&mut sink);
            node.compose(&mut stream, value)?;
            stream.align()?;
        }
        Ok(sink.into_bytes())
    }

    fn flagged() -> FormatNode {
        FormatNode::structure([
            StructField::new("has_id", FormatNode::integer(8)),
            StructField::new("id", FormatNode::optional("has_id", FormatNode::integer(8))),
        ])
    }

    #[test]
    fn test_optional_from_field() {
        let format = flagged();
        let present = format.parse_bytes(&[1, 9]).unwrap();
        assert_eq!(present.get("id"), Some(&Value::U64(9)));
        let absent = format.parse_bytes(&[0]).unwrap();
        assert_eq!(absent.get("id"), Some(&Value::Null));

        assert_eq!(compose(&format, &present).unwrap(), [1, 9]);
        assert_eq!(compose(&format, &absent).unwrap(), [0]);
        let missing_id = Value::map([("has_id", Value::U64(1))]);
        assert_eq!(
            compose(&format, &missing_id).unwrap_err().kind(),
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn test_optional_from_node() {
        let node = FormatNode::optional(FormatNode::boolean(), FormatNode::integer(7));
        assert_eq!(node.parse_bytes(&[0b1010_1011]).unwrap(), Value::U64(0b101_0101));
        assert_eq!(node.parse_bytes(&[0b1010_1010]).unwrap(), Value::Null);

        assert_eq!(compose(&node, &Value::U64(0b101_0101)).unwrap(), [0b1010_1011]);
        assert_eq!(compose(&node, &Value::Null).unwrap(), [0]);
    }

    #[test]
    fn test_optional_literal_and_callback() {
        let never = FormatNode::optional(false, FormatNode::integer(8));
        assert_eq!(never.parse_bytes(&[1]).unwrap(), Value::Null);
        assert!(compose(&never, &Value::U64(1)).is_err());

        let peek = FormatNode::optional(
            crate::size::Condition::callback(|stream| Ok(!stream.at_end()?)),
            FormatNode::integer(8),
        );
        assert_eq!(peek.parse_bytes(&[4]).unwrap(), Value::U64(4));
        assert_eq!(peek.parse_bytes(&[]).unwrap(), Value::Null);
        assert_eq!(compose(&peek, &Value::U64(4)).unwrap(), [4]);
    }

    fn shapes() -> FormatNode {
        FormatNode::choice(
            FormatNode::integer(8),
            [
                (Value::U64(1), ChoiceArm::Node(FormatNode::integer(16))),
                (Value::U64(2), ChoiceArm::Literal(Value::from("empty"))),
            ],
        )
    }

    #[test]
    fn test_choice() {
        let node = shapes();
        assert_eq!(node.parse_bytes(&[1, 0x01, 0x02]).unwrap(), Value::U64(0x0102));
        assert_eq!(node.parse_bytes(&[2]).unwrap(), Value::from("empty"));
        assert_eq!(
            compose(&node, &Value::U64(1)).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn test_choice_unknown_selector() {
        let err = shapes().parse_bytes(&[7]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        match &err {
            Error::UnknownChoice { key, choices } => {
                assert_eq!(key, "7");
                assert_eq!(choices, &["1", "2"]);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(
            err.to_string(),
            "unknown choice selector 7, choices are [1, 2]"
        );
    }

    #[test]
    fn test_choice_keys_match_across_integer_kinds() {
        let node = FormatNode::choice(
            FormatNode::boolean(),
            [
                (Value::U64(0), ChoiceArm::Literal(Value::from("off"))),
                (Value::I64(1), ChoiceArm::Literal(Value::from("on"))),
            ],
        );
        assert_eq!(node.parse_bytes(&[0b1]).unwrap(), Value::from("on"));
        assert_eq!(node.parse_bytes(&[0b0]).unwrap(), Value::from("off"));

        let floats = FormatNode::choice(
            FormatNode::boolean(),
            [(Value::Float(1.0), ChoiceArm::Literal(Value::from("on")))],
        );
        assert!(matches!(
            floats.parse_bytes(&[0b1]).unwrap_err(),
            Error::UnknownChoice { .. }
        ));
    }
}
