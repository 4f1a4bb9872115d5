//! Size and condition expressions, resolved while the stream is being walked.

use std::fmt;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::field::FieldPath;
use crate::node::FormatNode;
use crate::scope::Scope;
use crate::stream::BitStream;
use crate::value::Value;

/// Produces a size on demand.
pub type SizeFn = Arc<dyn Fn() -> Size + Send + Sync>;

/// Decides presence from the stream itself.
pub type ConditionFn = Arc<dyn Fn(&mut BitStream<'_>) -> Result<bool> + Send + Sync>;

/// How many bits (integers) or items/bytes (arrays, blobs, skips) a node spans.
#[derive(Clone)]
pub enum Size {
    Fixed(usize),
    /// Parsed at the point of use; the result is the size.
    Node(Box<FormatNode>),
    /// Value of a member already read by an enclosing struct.
    Field(FieldPath),
    Computed(SizeFn),
    /// Repeat or read until the stream runs out. Arrays and blobs only.
    ToEnd,
}

impl Size {
    pub fn field(path: impl Into<FieldPath>) -> Self {
        Size::Field(path.into())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> Size + Send + Sync + 'static,
    {
        Size::Computed(Arc::new(f))
    }

    pub fn node(node: FormatNode) -> Self {
        Size::Node(Box::new(node))
    }

    /// Resolves to a concrete count, reading from the stream if the size is a
    /// nested node.
    pub fn resolve(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<usize> {
        match self {
            Size::Fixed(n) => Ok(*n),
            Size::Node(node) => node.parse_in(stream, scope)?.to_usize(),
            Size::Field(path) => lookup(scope, path)?.to_usize(),
            Size::Computed(f) => f().resolve(stream, scope),
            Size::ToEnd => Err(to_end_misuse()),
        }
    }

    /// Resolves without touching the stream, for widths that must be known
    /// before a value is written.
    pub fn resolve_static(&self, scope: &Scope<'_>) -> Result<usize> {
        match self {
            Size::Fixed(n) => Ok(*n),
            Size::Field(path) => lookup(scope, path)?.to_usize(),
            Size::Computed(f) => f().resolve_static(scope),
            Size::Node(_) => Err(Error::unsupported(
                "a width read from the stream cannot be derived when composing",
            )),
            Size::ToEnd => Err(to_end_misuse()),
        }
    }

    /// Compose-side counterpart of [`Size::resolve`] for a sequence of
    /// `actual` items or bytes.
    ///
    /// A nested node is written with `actual`; any other size must agree with it.
    pub fn compose_count(
        &self,
        stream: &mut BitStream<'_>,
        actual: usize,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let expected = match self {
            Size::ToEnd => return Ok(()),
            Size::Node(node) => return node.compose_in(stream, &Value::from(actual), scope),
            Size::Computed(f) => return f().compose_count(stream, actual, scope),
            Size::Fixed(n) => *n,
            Size::Field(path) => lookup(scope, path)?.to_usize()?,
        };

        if expected != actual {
            return Err(Error::CountMismatch { expected, actual });
        }
        Ok(())
    }

    pub fn is_to_end(&self) -> bool {
        matches!(self, Size::ToEnd)
    }

    pub(crate) fn reset_deltas(&self) {
        if let Size::Node(node) = self {
            node.reset_deltas();
        }
    }
}

impl From<usize> for Size {
    fn from(value: usize) -> Self {
        Size::Fixed(value)
    }
}

impl From<&str> for Size {
    fn from(value: &str) -> Self {
        Size::field(value)
    }
}

impl From<FieldPath> for Size {
    fn from(value: FieldPath) -> Self {
        Size::Field(value)
    }
}

impl From<FormatNode> for Size {
    fn from(value: FormatNode) -> Self {
        Size::node(value)
    }
}

impl fmt::Debug for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Size::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Size::Field(path) => f.debug_tuple("Field").field(path).finish(),
            Size::Computed(_) => f.write_str("Computed(..)"),
            Size::ToEnd => f.write_str("ToEnd"),
        }
    }
}

/// Whether an optional node is present.
#[derive(Clone)]
pub enum Condition {
    Literal(bool),
    /// Parsed at the point of use; a truthy result means present.
    Node(Box<FormatNode>),
    /// Flag already read by an enclosing struct.
    Field(FieldPath),
    /// Called with the stream on parse. Not consulted on compose.
    Callback(ConditionFn),
}

impl Condition {
    pub fn field(path: impl Into<FieldPath>) -> Self {
        Condition::Field(path.into())
    }

    pub fn node(node: FormatNode) -> Self {
        Condition::Node(Box::new(node))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&mut BitStream<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        Condition::Callback(Arc::new(f))
    }

    pub fn evaluate(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<bool> {
        match self {
            Condition::Literal(b) => Ok(*b),
            Condition::Node(node) => Ok(node.parse_in(stream, scope)?.truthy()),
            Condition::Field(path) => Ok(lookup(scope, path)?.truthy()),
            Condition::Callback(f) => f(stream),
        }
    }

    /// Writes or checks the presence flag for a value that is (or is not) there.
    pub fn compose_presence(
        &self,
        stream: &mut BitStream<'_>,
        present: bool,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let flag = match self {
            Condition::Node(node) => return node.compose_in(stream, &Value::Bool(present), scope),
            Condition::Callback(_) => return Ok(()),
            Condition::Literal(b) => *b,
            Condition::Field(path) => lookup(scope, path)?.truthy(),
        };

        if flag != present {
            return Err(Error::format(format!(
                "optional value is {} but its condition says {}",
                if present { "present" } else { "absent" },
                if flag { "present" } else { "absent" },
            )));
        }
        Ok(())
    }

    pub(crate) fn reset_deltas(&self) {
        if let Condition::Node(node) = self {
            node.reset_deltas();
        }
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Condition::Literal(value)
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::field(value)
    }
}

impl From<FormatNode> for Condition {
    fn from(value: FormatNode) -> Self {
        Condition::node(value)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Literal(b) => f.debug_tuple("Literal").field(b).finish(),
            Condition::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Condition::Field(path) => f.debug_tuple("Field").field(path).finish(),
            Condition::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

fn to_end_misuse() -> Error {
    Error::format("read-to-end size is only valid for arrays and blobs")
}

fn lookup<'a>(scope: &Scope<'a>, path: &FieldPath) -> Result<&'a Value> {
    scope
        .lookup(path)
        .ok_or_else(|| Error::format(format!("no value for field {path}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryStream;
    use crate::value::Fields;

    fn reader(bytes: &[u8]) -> BitStream<'static> {
        BitStream::new(MemoryStream::from_bytes(bytes.to_vec()))
    }

    #[test]
    fn test_resolve_fixed_and_computed() {
        let mut stream = reader(&[]);
        let scope = Scope::root();
        assert_eq!(Size::Fixed(4).resolve(&mut stream, &scope).unwrap(), 4);
        let computed = Size::computed(|| Size::Fixed(6));
        assert_eq!(computed.resolve(&mut stream, &scope).unwrap(), 6);
        assert!(Size::ToEnd.resolve(&mut stream, &scope).is_err());
    }

    #[test]
    fn test_resolve_node_reads_stream() {
        let mut stream = reader(&[0x05, 0xFF]);
        let size = Size::node(FormatNode::integer(8));
        assert_eq!(size.resolve(&mut stream, &Scope::root()).unwrap(), 5);
        assert_eq!(stream.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn test_resolve_field() {
        let mut fields = Fields::new();
        fields.insert("len".into(), Value::U64(3));
        let root = Scope::root();
        let scope = root.child(&fields);
        let mut stream = reader(&[]);

        assert_eq!(Size::from("len").resolve(&mut stream, &scope).unwrap(), 3);
        let err = Size::from("missing").resolve(&mut stream, &scope).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_compose_count() {
        let mut sink = MemoryStream::new();
        {
            let mut stream = BitStream::new(&mut sink);
            let scope = Scope::root();
            Size::Fixed(2).compose_count(&mut stream, 2, &scope).unwrap();
            let err = Size::Fixed(2).compose_count(&mut stream, 3, &scope).unwrap_err();
            assert!(matches!(err, Error::CountMismatch { expected: 2, actual: 3 }));
            Size::node(FormatNode::integer(8))
                .compose_count(&mut stream, 7, &scope)
                .unwrap();
        }
        assert_eq!(sink.as_bytes(), &[7]);
    }

    #[test]
    fn test_static_width_from_node_is_unsupported() {
        let size = Size::node(FormatNode::integer(8));
        let err = size.resolve_static(&Scope::root()).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Unsupported);
    }

    #[test]
    fn test_condition_evaluate() {
        let mut stream = reader(&[0b0000_0001]);
        let scope = Scope::root();
        assert!(Condition::Literal(true).evaluate(&mut stream, &scope).unwrap());
        assert!(Condition::node(FormatNode::boolean())
            .evaluate(&mut stream, &scope)
            .unwrap());
        let callback = Condition::callback(|stream| Ok(stream.read_bits(7)? == 0));
        assert!(callback.evaluate(&mut stream, &scope).unwrap());
    }

    #[test]
    fn test_presence_must_match_flag() {
        let mut fields = Fields::new();
        fields.insert("has_body".into(), Value::Bool(false));
        let root = Scope::root();
        let scope = root.child(&fields);
        let mut sink = MemoryStream::new();
        let mut stream = BitStream::new(&mut sink);

        let condition = Condition::field("has_body");
        condition.compose_presence(&mut stream, false, &scope).unwrap();
        assert!(condition.compose_presence(&mut stream, true, &scope).is_err());
    }
}
