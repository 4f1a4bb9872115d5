//! Nodes that rewrite the value of the node they wrap.
//!
//! - [`DeltaNode`] turns a sequence of differences into running totals. The
//!   total is kept in the node and carried across parses until
//!   [`DeltaNode::reset`] is called.
//! - [`TranslateNode`] maps raw values onto meaningful ones, through a lookup
//!   table (reversible) or a function (parse only).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use num_bigint::BigInt;
use num_traits::Zero;
use tracing::trace;

use crate::errors::{Error, Result};
use crate::node::FormatNode;
use crate::scope::Scope;
use crate::stream::BitStream;
use crate::value::Value;

/// Running total of a [`DeltaNode`]. The fold rule follows the wrapped node.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Blobs concatenate.
    Bytes(Vec<u8>),
    /// Arrays concatenate.
    Items(Vec<Value>),
    /// Booleans combine with logical AND.
    All(bool),
    /// Everything else sums.
    Sum(BigInt),
}

impl Accumulator {
    /// Empty total for values produced by `node`.
    pub fn for_node(node: &FormatNode) -> Self {
        match node {
            FormatNode::Blob(_) => Accumulator::Bytes(Vec::new()),
            FormatNode::Array(_) => Accumulator::Items(Vec::new()),
            FormatNode::Boolean => Accumulator::All(true),
            _ => Accumulator::Sum(BigInt::zero()),
        }
    }

    pub fn value(&self) -> Value {
        match self {
            Accumulator::Bytes(bytes) => Value::Bytes(bytes.clone()),
            Accumulator::Items(items) => Value::Array(items.clone()),
            Accumulator::All(all) => Value::Bool(*all),
            Accumulator::Sum(sum) => Value::big(sum.clone()),
        }
    }

    /// Adds one parsed value to the total.
    fn fold(&mut self, read: &Value) -> Result<()> {
        let read = read.untyped(None)?;
        match self {
            Accumulator::Bytes(bytes) => bytes.extend_from_slice(read.as_bytes().ok_or_else(
                || Error::format(format!("cannot append {} to bytes", read.kind_name())),
            )?),
            Accumulator::Items(items) => items.extend_from_slice(read.as_array().ok_or_else(
                || Error::format(format!("cannot append {} to a list", read.kind_name())),
            )?),
            Accumulator::All(all) => *all = *all && read.truthy(),
            Accumulator::Sum(sum) => *sum += read.to_bigint().ok_or_else(|| {
                Error::format(format!("cannot add {} to a sum", read.kind_name()))
            })?,
        }
        Ok(())
    }

    /// Difference that takes the total to `target`, and the total after it.
    fn difference(&self, target: &Value) -> Result<(Value, Accumulator)> {
        let target = target.untyped(None)?;
        let mismatch = || {
            Error::format(format!(
                "running total {} cannot continue from {}",
                target,
                self.value()
            ))
        };

        match self {
            Accumulator::Bytes(bytes) => {
                let next = target.as_bytes().ok_or_else(mismatch)?;
                let rest = next.strip_prefix(bytes.as_slice()).ok_or_else(mismatch)?;
                Ok((Value::Bytes(rest.to_vec()), Accumulator::Bytes(next.to_vec())))
            }
            Accumulator::Items(items) => {
                let next = target.as_array().ok_or_else(mismatch)?;
                let rest = next.strip_prefix(items.as_slice()).ok_or_else(mismatch)?;
                Ok((Value::Array(rest.to_vec()), Accumulator::Items(next.to_vec())))
            }
            Accumulator::All(all) => {
                let next = target.truthy();
                if next && !all {
                    return Err(mismatch());
                }
                Ok((Value::Bool(next), Accumulator::All(next)))
            }
            Accumulator::Sum(sum) => {
                let next = target.to_bigint().ok_or_else(mismatch)?;
                Ok((Value::big(&next - sum), Accumulator::Sum(next)))
            }
        }
    }
}

/// Wraps a node and returns the running total of its values.
///
/// The total lives in the node, so one tree instance must not be shared by
/// independent streams without a [`reset`](DeltaNode::reset) in between.
pub struct DeltaNode {
    pub item: Box<FormatNode>,
    total: Mutex<Accumulator>,
}

impl DeltaNode {
    pub fn new(item: FormatNode) -> Self {
        let total = Accumulator::for_node(&item);
        Self {
            item: Box::new(item),
            total: Mutex::new(total),
        }
    }

    /// Current running total.
    pub fn total(&self) -> Value {
        self.lock().value()
    }

    /// Restarts the running total.
    pub fn reset(&self) {
        *self.lock() = Accumulator::for_node(&self.item);
    }

    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let read = self.item.parse_in(stream, scope)?;
        let mut total = self.lock();
        total.fold(&read)?;
        let value = total.value();
        trace!(delta = %read, total = %value, "delta");
        Ok(value)
    }

    /// Writes the difference between `value` and the current total, then
    /// advances the total to `value`.
    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let mut total = self.lock();
        let (delta, next) = total.difference(value)?;
        self.item.compose_in(stream, &delta, scope)?;
        *total = next;
        Ok(())
    }
}

impl Clone for DeltaNode {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            total: Mutex::new(self.lock().clone()),
        }
    }
}

impl fmt::Debug for DeltaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaNode")
            .field("item", &self.item)
            .field("total", &*self.lock())
            .finish()
    }
}

/// Maps a raw value onto its translation.
pub type TranslateFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// How a [`TranslateNode`] maps values.
#[derive(Clone)]
pub enum Translation {
    /// `(raw, translated)` pairs. Reversible.
    Table(Vec<(Value, Value)>),
    /// Parse only.
    Func(TranslateFn),
}

impl Translation {
    pub fn table<R, T>(pairs: impl IntoIterator<Item = (R, T)>) -> Self
    where
        R: Into<Value>,
        T: Into<Value>,
    {
        Translation::Table(
            pairs
                .into_iter()
                .map(|(raw, translated)| (raw.into(), translated.into()))
                .collect(),
        )
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Translation::Func(Arc::new(f))
    }
}

impl fmt::Debug for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Translation::Table(pairs) => f.debug_tuple("Table").field(pairs).finish(),
            Translation::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Translates the value of the node it wraps.
///
/// Raw values missing from a table pass through unchanged when parsing;
/// composing a value missing from the table fails.
#[derive(Debug, Clone)]
pub struct TranslateNode {
    pub item: Box<FormatNode>,
    pub translation: Translation,
}

impl TranslateNode {
    pub fn new(item: FormatNode, translation: Translation) -> Self {
        Self {
            item: Box::new(item),
            translation,
        }
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let raw = self.item.parse_in(stream, scope)?;
        Ok(match &self.translation {
            Translation::Table(pairs) => pairs
                .iter()
                .find_map(|(from, to)| (*from == raw).then(|| to.clone()))
                .unwrap_or(raw),
            Translation::Func(f) => f(raw),
        })
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let Translation::Table(pairs) = &self.translation else {
            return Err(Error::unsupported(
                "a function translation cannot be reversed",
            ));
        };

        let raw = pairs
            .iter()
            .find_map(|(from, to)| (to == value).then_some(from))
            .ok_or_else(|| {
                Error::format(format!("{value} has no entry in the translation table"))
            })?;
        self.item.compose_in(stream, raw, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::size::Size;
    use crate::source::MemoryStream;

    #[test]
    fn test_delta_running_total() {
        let node = FormatNode::delta(FormatNode::integer(8));
        let mut stream = BitStream::new(MemoryStream::from_bytes(vec![1, 2, 3]));
        assert_eq!(node.parse(&mut stream).unwrap(), Value::U64(1));
        assert_eq!(node.parse(&mut stream).unwrap(), Value::U64(3));
        assert_eq!(node.parse(&mut stream).unwrap(), Value::U64(6));

        node.reset_deltas();
        assert_eq!(node.parse_bytes(&[5]).unwrap(), Value::U64(5));
    }

    #[test]
    fn test_delta_compose_writes_differences() {
        let node = FormatNode::delta(FormatNode::integer(8));
        let mut sink = MemoryStream::new();
        {
            let mut stream = BitStream::new(&mut sink);
            for total in [1u64, 3, 6] {
                node.compose(&mut stream, &Value::U64(total)).unwrap();
            }
            let err = node.compose(&mut stream, &Value::U64(2)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(sink.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_delta_folds_by_kind() {
        let blob = FormatNode::delta(FormatNode::blob(1));
        let mut stream = BitStream::new(MemoryStream::from_bytes(b"ab".to_vec()));
        blob.parse(&mut stream).unwrap();
        assert_eq!(blob.parse(&mut stream).unwrap(), Value::from(&b"ab"[..]));

        let list = FormatNode::delta(FormatNode::array(1, FormatNode::integer(8)));
        let mut stream = BitStream::new(MemoryStream::from_bytes(vec![4, 5]));
        list.parse(&mut stream).unwrap();
        assert_eq!(
            list.parse(&mut stream).unwrap(),
            Value::Array(vec![Value::U64(4), Value::U64(5)])
        );

        let all = FormatNode::delta(FormatNode::boolean());
        let mut stream = BitStream::new(MemoryStream::from_bytes(vec![0b0000_0101]));
        assert_eq!(all.parse(&mut stream).unwrap(), Value::Bool(true));
        assert_eq!(all.parse(&mut stream).unwrap(), Value::Bool(false));
        assert_eq!(all.parse(&mut stream).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_delta_blob_compose_requires_prefix() {
        let blob = FormatNode::delta(FormatNode::blob(Size::ToEnd));
        let mut sink = MemoryStream::new();
        let mut stream = BitStream::new(&mut sink);
        blob.compose(&mut stream, &Value::from(&b"ab"[..])).unwrap();
        blob.compose(&mut stream, &Value::from(&b"abc"[..])).unwrap();
        let err = blob.compose(&mut stream, &Value::from(&b"xy"[..])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    fn opcodes() -> FormatNode {
        FormatNode::translate(
            FormatNode::integer(8),
            Translation::table([(1u64, "read"), (2u64, "write")]),
        )
    }

    #[test]
    fn test_translate_table() {
        let node = opcodes();
        assert_eq!(node.parse_bytes(&[2]).unwrap(), Value::from("write"));
        assert_eq!(node.parse_bytes(&[9]).unwrap(), Value::U64(9));

        let mut sink = MemoryStream::new();
        {
            let mut stream = BitStream::new(&mut sink);
            node.compose(&mut stream, &Value::from("read")).unwrap();
            let err = node.compose(&mut stream, &Value::from("erase")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        }
        assert_eq!(sink.as_bytes(), &[1]);
    }

    #[test]
    fn test_translate_func() {
        let node = FormatNode::translate(
            FormatNode::integer(8),
            Translation::func(|raw| Value::from(raw.as_u64().unwrap_or(0) * 10)),
        );
        assert_eq!(node.parse_bytes(&[4]).unwrap(), Value::U64(40));

        let mut sink = MemoryStream::new();
        let mut stream = BitStream::new(&mut sink);
        let err = node.compose(&mut stream, &Value::U64(40)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
