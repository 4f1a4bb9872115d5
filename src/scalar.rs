//! Leaf nodes that read numbers and raw bytes.

use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive};
use tracing::trace;

use crate::bit_buffer::BitBuffer;
use crate::bits::{Endian, NATIVE_BITS, sign_extend};
use crate::errors::{Error, Result};
use crate::scope::Scope;
use crate::size::Size;
use crate::stream::BitStream;
use crate::value::Value;

/// An integer of a dynamic bit width with a constant offset.
///
/// A width of zero reads nothing and yields the constant, which makes a
/// virtual field.
#[derive(Debug, Clone)]
pub struct IntegerNode {
    /// Width in bits.
    pub size: Size,
    /// Added after reading, subtracted before writing.
    pub constant: i64,
    pub endian: Endian,
    /// Two's complement when set.
    pub signed: bool,
}

impl IntegerNode {
    pub fn new(size: impl Into<Size>) -> Self {
        Self {
            size: size.into(),
            constant: 0,
            endian: Endian::Big,
            signed: false,
        }
    }

    pub fn constant(mut self, constant: i64) -> Self {
        self.constant = constant;
        self
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        if matches!(self.size, Size::Fixed(0)) {
            return Ok(Value::from(self.constant));
        }

        let width = self.size.resolve(stream, scope)?;
        if width == 0 {
            return Ok(Value::from(self.constant));
        }

        let raw = if width <= NATIVE_BITS {
            let bits = stream.read_bits_with(width, self.endian)?;
            if self.signed {
                BigInt::from(sign_extend(bits, width))
            } else {
                BigInt::from(bits)
            }
        } else {
            let unsigned = BigInt::from_biguint(
                Sign::Plus,
                stream.read_buffer(width, self.endian)?.to_biguint(),
            );
            if self.signed && unsigned.bit(width as u64 - 1) {
                unsigned - (BigInt::one() << width)
            } else {
                unsigned
            }
        };

        trace!(width, value = %raw, "read integer");
        Ok(Value::big(raw + self.constant))
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        if matches!(self.size, Size::Fixed(0)) {
            return Ok(());
        }

        let width = self.size.resolve_static(scope)?;
        if width == 0 {
            return Ok(());
        }

        let number = value.to_bigint().ok_or_else(|| {
            Error::format(format!("integer expects a number, got {}", value.kind_name()))
        })?;
        let raw = number - self.constant;
        let encoded = encode_width(&raw, width, self.signed)?;

        trace!(width, value = %raw, "write integer");
        match encoded.to_u64() {
            Some(bits) if width <= NATIVE_BITS => stream.write_bits_with(bits, width, self.endian),
            _ => {
                let magnitude = encoded.magnitude();
                stream.write_buffer(BitBuffer::from_biguint(magnitude, Some(width))?, self.endian)
            }
        }
    }
}

/// Maps `raw` onto the unsigned bit pattern written for a `width`-bit field.
fn encode_width(raw: &BigInt, width: usize, signed: bool) -> Result<BigInt> {
    let span = BigInt::one() << width;
    let fits = if signed {
        let half = BigInt::one() << (width - 1);
        *raw >= -&half && *raw < half
    } else {
        !raw.is_negative() && *raw < span
    };
    if !fits {
        return Err(Error::argument(format!(
            "value {raw} does not fit a {} {width}-bit integer",
            if signed { "signed" } else { "unsigned" }
        )));
    }

    Ok(if raw.is_negative() { raw + span } else { raw.clone() })
}

/// Raw bytes, read from a byte boundary.
#[derive(Debug, Clone)]
pub struct BlobNode {
    /// Length in bytes.
    pub size: Size,
    /// When set, the bytes are returned as a [`Value::Typed`] with this name.
    pub type_name: Option<String>,
}

impl BlobNode {
    pub fn new(size: impl Into<Size>) -> Self {
        Self {
            size: size.into(),
            type_name: None,
        }
    }

    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let bytes = if self.size.is_to_end() {
            stream.read_to_end()?
        } else {
            let len = self.size.resolve(stream, scope)?;
            stream.read_aligned_bytes(len)?
        };

        trace!(len = bytes.len(), "read blob");
        let bytes = Value::Bytes(bytes);
        Ok(match &self.type_name {
            Some(type_name) => Value::typed(type_name, bytes),
            None => bytes,
        })
    }

    pub(crate) fn compose_in(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<()> {
        let bytes = value
            .untyped(self.type_name.as_deref())?
            .as_bytes()
            .ok_or_else(|| {
                Error::format(format!("blob expects bytes, got {}", value.kind_name()))
            })?;

        self.size.compose_count(stream, bytes.len(), scope)?;
        stream.write_aligned_bytes(bytes)
    }
}

/// Bytes that are read and thrown away.
#[derive(Debug, Clone)]
pub struct SkipNode {
    /// Length in bytes.
    pub size: Size,
    /// Drop any partially read byte before skipping.
    pub align: bool,
}

impl SkipNode {
    pub fn new(size: impl Into<Size>) -> Self {
        Self {
            size: size.into(),
            align: false,
        }
    }

    pub fn aligned(mut self, align: bool) -> Self {
        self.align = align;
        self
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>, scope: &Scope<'_>) -> Result<Value> {
        let len = self.size.resolve(stream, scope)?;
        if self.align {
            stream.align()?;
        }
        stream.read_bytes(len)?;
        trace!(len, "skipped bytes");
        Ok(Value::Null)
    }

    pub(crate) fn compose_in(
        &self,
        _stream: &mut BitStream<'_>,
        _value: &Value,
        _scope: &Scope<'_>,
    ) -> Result<()> {
        Err(Error::unsupported("skipped bytes cannot be reconstructed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::node::FormatNode;
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

    #[test]
    fn test_integer_endianness() {
        let big = FormatNode::integer(16);
        let little = FormatNode::from(IntegerNode::new(16).endian(Endian::Little));
        assert_eq!(big.parse_bytes(&[0x42, 0x00]).unwrap(), Value::U64(16896));
        assert_eq!(little.parse_bytes(&[0x42, 0x00]).unwrap(), Value::U64(66));
        assert_eq!(compose(&little, &Value::U64(66)).unwrap(), [0x42, 0x00]);
    }

    #[test]
    fn test_integer_constant() {
        let node = FormatNode::from(IntegerNode::new(8).constant(-10));
        assert_eq!(node.parse_bytes(&[3]).unwrap(), Value::I64(-7));
        assert_eq!(compose(&node, &Value::I64(-7)).unwrap(), [3]);

        let virtual_field = FormatNode::from(IntegerNode::new(0).constant(42));
        assert_eq!(virtual_field.parse_bytes(&[]).unwrap(), Value::U64(42));
        assert_eq!(compose(&virtual_field, &Value::U64(42)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_integer_signed() {
        let node = FormatNode::from(IntegerNode::new(4).signed(true));
        let mut stream = BitStream::new(MemoryStream::from_bytes(vec![0x7E]));
        assert_eq!(node.parse(&mut stream).unwrap(), Value::I64(-2));
        assert_eq!(node.parse(&mut stream).unwrap(), Value::U64(7));

        assert_eq!(compose(&node, &Value::I64(-8)).unwrap(), [0x08]);
        let err = compose(&node, &Value::U64(8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_integer_out_of_range() {
        let node = FormatNode::integer(8);
        assert_eq!(
            compose(&node, &Value::U64(256)).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            compose(&node, &Value::I64(-1)).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            compose(&node, &Value::from("x")).unwrap_err().kind(),
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn test_wide_integer() {
        let node = FormatNode::integer(72);
        let bytes = [0x01, 0, 0, 0, 0, 0, 0, 0, 0x02];
        let value = node.parse_bytes(&bytes).unwrap();
        let expected = (BigInt::one() << 64) + BigInt::from(2);
        assert_eq!(value, Value::Big(expected));
        assert_eq!(compose(&node, &value).unwrap(), bytes);

        let signed = FormatNode::from(IntegerNode::new(72).signed(true));
        let minus_one = signed.parse_bytes(&[0xFF; 9]).unwrap();
        assert_eq!(minus_one, Value::I64(-1));
        assert_eq!(compose(&signed, &minus_one).unwrap(), [0xFF; 9]);
    }

    #[test]
    fn test_integer_width_from_node_cannot_compose() {
        let node = FormatNode::integer(FormatNode::integer(8));
        assert_eq!(node.parse_bytes(&[4, 0x0A]).unwrap(), Value::U64(0x0A));
        assert_eq!(
            compose(&node, &Value::U64(1)).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn test_blob_aligns() {
        let format = FormatNode::structure([
            crate::field::StructField::new("flag", FormatNode::boolean()),
            crate::field::StructField::new("data", FormatNode::blob(2)),
        ]);
        let bytes = [0x01, b'h', b'i'];
        let value = format.parse_bytes(&bytes).unwrap();
        assert_eq!(value.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(value.get("data"), Some(&Value::from(&b"hi"[..])));
        assert_eq!(compose(&format, &value).unwrap(), bytes);
    }

    #[test]
    fn test_blob_typed_and_to_end() {
        let node = FormatNode::from(BlobNode::new(Size::ToEnd).typed("Payload"));
        let value = node.parse_bytes(b"rest").unwrap();
        assert_eq!(value, Value::typed("Payload", Value::from(&b"rest"[..])));
        assert_eq!(compose(&node, &value).unwrap(), b"rest");
        assert_eq!(compose(&node, &Value::from("rest")).unwrap(), b"rest");
    }

    #[test]
    fn test_blob_length_mismatch() {
        let node = FormatNode::blob(3);
        let err = compose(&node, &Value::from(&b"ab"[..])).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn test_skip() {
        let format = FormatNode::structure([
            crate::field::StructField::new("a", FormatNode::integer(4)),
            crate::field::StructField::new(
                "gap",
                FormatNode::from(SkipNode::new(1).aligned(true)),
            ),
            crate::field::StructField::new("b", FormatNode::integer(8)),
        ]);
        let value = format.parse_bytes(&[0x0F, 0xEE, 0x05]).unwrap();
        assert_eq!(value.get("a"), Some(&Value::U64(0xF)));
        assert_eq!(value.get("gap"), Some(&Value::Null));
        assert_eq!(value.get("b"), Some(&Value::U64(5)));

        let err = compose(&FormatNode::skip(1), &Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_skip_past_end() {
        assert!(FormatNode::skip(2).parse_bytes(&[1]).unwrap_err().is_end_of_stream());
    }
}
