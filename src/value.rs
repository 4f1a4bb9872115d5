//! Structured values produced by parsing and consumed by composing.

use std::fmt;

use indexmap::IndexMap;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::errors::{Error, Result};

/// Keyed fields of a struct value, in declaration order.
pub type Fields = IndexMap<String, Value>;

/// A value read from, or written to, a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent optional, skipped bytes, or a missing struct field.
    #[default]
    Null,
    Bool(bool),
    U64(u64),
    /// Only holds negative numbers; non-negative integers are `U64`.
    I64(i64),
    /// Integers outside the `i64`/`u64` range.
    Big(BigInt),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Map(Fields),
    /// Value tagged with the target type name of the node that built it.
    Typed { type_name: String, inner: Box<Value> },
}

impl Value {
    /// Canonical integer value: `U64` when non-negative, `I64` otherwise.
    pub fn integer(n: i128) -> Value {
        if let Ok(n) = u64::try_from(n) {
            Value::U64(n)
        } else if let Ok(n) = i64::try_from(n) {
            Value::I64(n)
        } else {
            Value::Big(BigInt::from(n))
        }
    }

    /// Canonical integer value for an arbitrary-precision number.
    pub fn big(n: BigInt) -> Value {
        match n.to_i128() {
            Some(small) => Value::integer(small),
            None => Value::Big(n),
        }
    }

    /// Builds a map value from `(key, value)` pairs, keeping their order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn typed(type_name: impl Into<String>, inner: Value) -> Value {
        Value::Typed {
            type_name: type_name.into(),
            inner: Box::new(inner),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::U64(_) | Value::I64(_) | Value::Big(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Typed { .. } => "typed",
        }
    }

    /// Integer view of the value. Booleans count as 0 and 1, floats are
    /// truncated.
    pub fn to_i128(&self) -> Option<i128> {
        match self {
            Value::Bool(b) => Some(*b as i128),
            Value::U64(n) => Some(*n as i128),
            Value::I64(n) => Some(*n as i128),
            Value::Big(n) => n.to_i128(),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i128),
            Value::Typed { inner, .. } => inner.to_i128(),
            _ => None,
        }
    }

    /// Arbitrary-precision integer view of the value.
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Big(n) => Some(n.clone()),
            Value::Typed { inner, .. } => inner.to_bigint(),
            other => other.to_i128().map(BigInt::from),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.to_i128().and_then(|n| u64::try_from(n).ok())
    }

    /// Coerces the value to a count or width.
    pub fn to_usize(&self) -> Result<usize> {
        let n = self.to_i128().ok_or_else(|| {
            Error::format(format!("{} value cannot be used as a size", self.kind_name()))
        })?;
        usize::try_from(n).map_err(|_| Error::format(format!("size {n} is out of range")))
    }

    /// Loose truthiness: zero, empty and null are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::U64(n) => *n != 0,
            Value::I64(n) => *n != 0,
            Value::Big(n) => !n.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::Bytes(b) => !b.is_empty() && b.as_slice() != b"0",
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Array(items) => !items.is_empty(),
            Value::Map(fields) => !fields.is_empty(),
            Value::Typed { inner, .. } => inner.truthy(),
        }
    }

    /// Raw bytes of a bytes or string value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Looks up a key of a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.get(key),
            Value::Typed { inner, .. } => inner.get(key),
            _ => None,
        }
    }

    /// Strips a `Typed` wrapper, checking its name against `expected`.
    ///
    /// A bare value is accepted as is.
    pub fn untyped(&self, expected: Option<&str>) -> Result<&Value> {
        match (self, expected) {
            (Value::Typed { type_name, .. }, Some(expected)) if type_name != expected => Err(
                Error::format(format!("expected a {expected} value, got {type_name}")),
            ),
            (Value::Typed { inner, .. }, _) => Ok(inner),
            (value, _) => Ok(value),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U64(value as u64)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::U64(value as u64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U64(value as u64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::U64(value as u64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::integer(value as i128)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::integer(value as i128)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::big(value)
    }
}

impl From<BigUint> for Value {
    fn from(value: BigUint) -> Self {
        Value::big(BigInt::from_biguint(Sign::Plus, value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<Fields> for Value {
    fn from(value: Fields) -> Self {
        Value::Map(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::U64(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::Big(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bytes(bytes) => {
                write!(f, "0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Typed { type_name, inner } => write!(f, "{type_name}({inner})"),
        }
    }
}
