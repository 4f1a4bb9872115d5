//! Arbitrary-width unsigned bit accumulator.
//!
//! A [`BitBuffer`] holds `size` bits of an unsigned value. Bits can be added
//! or removed at either end, which is how streams assemble values in either
//! byte order. Buffers declared wider than a machine word are backed by a
//! big integer for their whole lifetime.

use num_bigint::BigUint;

use crate::{
    backend::{BigUInt, NativeUInt, UIntBackend},
    bits::{Endian, NATIVE_BITS, integer_size, low_mask},
    errors::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Native(NativeUInt),
    Big(BigUInt),
}

impl Repr {
    fn backend(&self) -> &dyn UIntBackend {
        match self {
            Repr::Native(native) => native,
            Repr::Big(big) => big,
        }
    }

    fn backend_mut(&mut self) -> &mut dyn UIntBackend {
        match self {
            Repr::Native(native) => native,
            Repr::Big(big) => big,
        }
    }
}

/// Unsigned value of a known bit length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    bit_width: usize,
    size: usize,
    repr: Repr,
}

impl BitBuffer {
    /// Creates an empty buffer sized for `bit_width` bits.
    pub fn new(bit_width: usize) -> Self {
        let repr = if bit_width > NATIVE_BITS {
            Repr::Big(BigUInt::default())
        } else {
            Repr::Native(NativeUInt::default())
        };

        Self {
            bit_width,
            size: 0,
            repr,
        }
    }

    /// Buffer holding `n` in `width` bits, or in its minimal width when `None`.
    pub fn from_number(n: u64, width: Option<usize>) -> Result<Self> {
        let width = width.unwrap_or_else(|| integer_size(n));
        if n != 0 && integer_size(n) > width {
            return Err(Error::argument(format!(
                "value {n} does not fit in {width} bits"
            )));
        }
        if width > NATIVE_BITS {
            let mut buffer = Self::new(width);
            buffer.repr = Repr::Big(BigUInt(BigUint::from(n)));
            buffer.size = width;
            return Ok(buffer);
        }

        let mut buffer = Self::new(width);
        buffer.push(n, width)?;
        Ok(buffer)
    }

    /// Buffer holding `n` in `width` bits, or in its minimal width when `None`.
    pub fn from_biguint(n: &BigUint, width: Option<usize>) -> Result<Self> {
        let needed = (n.bits() as usize).max(1);
        let width = width.unwrap_or(needed);
        if needed > width && n.bits() > 0 {
            return Err(Error::argument(format!(
                "value needs {needed} bits, buffer holds {width}"
            )));
        }

        let mut buffer = Self::new(width);
        buffer.repr = if buffer.is_big() {
            Repr::Big(BigUInt(n.clone()))
        } else {
            Repr::Native(NativeUInt(n.iter_u64_digits().next().unwrap_or(0)))
        };
        buffer.size = width;
        Ok(buffer)
    }

    /// Reads `bytes` into a fresh buffer of `8 * bytes.len()` bits.
    ///
    /// Big-endian input is consumed most significant byte first, little-endian
    /// input least significant byte first.
    pub fn from_bytes(bytes: &[u8], endian: Endian) -> Self {
        let mut buffer = Self::new(bytes.len() * 8);
        for &byte in bytes {
            match endian {
                Endian::Big => buffer.append_low(byte as u64, 8),
                Endian::Little => buffer.append_high(byte as u64, 8),
            }
        }
        buffer
    }

    /// Declared width used to pick the representation.
    pub fn bit_width(&self) -> usize {
        self.bit_width
    }

    /// Number of bits currently held.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True when the buffer is backed by a big integer.
    pub fn is_big(&self) -> bool {
        matches!(self.repr, Repr::Big(_))
    }

    fn capacity(&self) -> usize {
        match self.repr {
            Repr::Native(_) => NATIVE_BITS,
            Repr::Big(_) => usize::MAX,
        }
    }

    fn check_grow(&self, width: usize) -> Result<()> {
        if width > NATIVE_BITS {
            return Err(Error::argument(format!(
                "cannot add {width} bits at once, at most {NATIVE_BITS}"
            )));
        }
        if self.size + width > self.capacity() {
            return Err(Error::state(format!(
                "buffer of {} bits cannot grow by {width}",
                self.capacity()
            )));
        }
        Ok(())
    }

    fn check_take(&self, width: usize) -> Result<()> {
        if width > NATIVE_BITS {
            return Err(Error::argument(format!(
                "cannot take {width} bits at once, at most {NATIVE_BITS}"
            )));
        }
        if width > self.size {
            return Err(Error::state(format!(
                "cannot take {width} bits from a buffer holding {}",
                self.size
            )));
        }
        Ok(())
    }

    fn append_low(&mut self, bits: u64, width: usize) {
        self.repr
            .backend_mut()
            .shl_or(width, bits & low_mask(width));
        self.size += width;
    }

    fn append_high(&mut self, bits: u64, width: usize) {
        let at = self.size;
        self.repr.backend_mut().or_at(bits & low_mask(width), at);
        self.size += width;
    }

    /// Appends the low `width` bits of `bits` below the held bits:
    /// `value = (value << width) | bits`.
    pub fn push(&mut self, bits: u64, width: usize) -> Result<()> {
        self.check_grow(width)?;
        self.append_low(bits, width);
        Ok(())
    }

    /// [`push`](Self::push) using the minimal width of `bits`.
    pub fn push_fit(&mut self, bits: u64) -> Result<()> {
        self.push(bits, integer_size(bits))
    }

    /// Adds the low `width` bits of `bits` above the held bits:
    /// `value = (bits << size) | value`.
    pub fn unshift(&mut self, bits: u64, width: usize) -> Result<()> {
        self.check_grow(width)?;
        self.append_high(bits, width);
        Ok(())
    }

    /// [`unshift`](Self::unshift) using the minimal width of `bits`.
    pub fn unshift_fit(&mut self, bits: u64) -> Result<()> {
        self.unshift(bits, integer_size(bits))
    }

    /// Removes and returns the low `width` bits.
    pub fn pop(&mut self, width: usize) -> Result<u64> {
        self.check_take(width)?;
        let backend = self.repr.backend_mut();
        let bits = backend.extract(0, width);
        backend.shr(width);
        self.size -= width;
        Ok(bits)
    }

    /// Removes and returns the high `width` bits.
    pub fn shift(&mut self, width: usize) -> Result<u64> {
        self.check_take(width)?;
        let at = self.size - width;
        let backend = self.repr.backend_mut();
        let bits = backend.extract(at, width);
        backend.xor_at(bits, at);
        self.size -= width;
        Ok(bits)
    }

    /// Held value as a `u64`; fails if it does not fit.
    pub fn to_u64(&self) -> Result<u64> {
        let backend = self.repr.backend();
        if backend.significant_bits() > NATIVE_BITS {
            return Err(Error::state(format!(
                "{}-bit value does not fit a native integer",
                backend.significant_bits()
            )));
        }
        Ok(backend.extract(0, NATIVE_BITS))
    }

    pub fn to_biguint(&self) -> BigUint {
        self.repr.backend().to_biguint()
    }

    /// Exports the held bits as bytes in the given order.
    ///
    /// When `size` is not a multiple of eight the most significant byte is
    /// padded with zero bits.
    pub fn to_bytes(&self, endian: Endian) -> Vec<u8> {
        let count = self.size.div_ceil(8);
        let backend = self.repr.backend();
        let byte_at = |i: usize| {
            let width = (self.size - i * 8).min(8);
            backend.extract(i * 8, width) as u8
        };

        match endian {
            Endian::Big => (0..count).rev().map(byte_at).collect(),
            Endian::Little => (0..count).map(byte_at).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide() -> BitBuffer {
        BitBuffer::new(NATIVE_BITS + 1)
    }

    #[test]
    fn test_push_appends() {
        for mut buffer in [BitBuffer::new(12), wide()] {
            buffer.push_fit(0b110).unwrap();
            assert_eq!(buffer.to_u64().unwrap(), 0b110);
            buffer.push_fit(0b11).unwrap();
            assert_eq!(buffer.to_u64().unwrap(), 0b11011);
            assert_eq!(buffer.size(), 5);
        }
    }

    #[test]
    fn test_unshift_prepends() {
        for mut buffer in [BitBuffer::new(12), wide()] {
            buffer.unshift_fit(0b110).unwrap();
            assert_eq!(buffer.to_u64().unwrap(), 0b110);
            buffer.unshift_fit(0b11).unwrap();
            assert_eq!(buffer.to_u64().unwrap(), 0b11110);
        }
    }

    #[test]
    fn test_pop() {
        let mut small = BitBuffer::from_number(0b10111011011101011, None).unwrap();
        let mut big = wide();
        big.push_fit(0b10111011011101011).unwrap();

        for buffer in [&mut small, &mut big] {
            assert_eq!(buffer.pop(5).unwrap(), 0b1011);
            assert_eq!(buffer.pop(9).unwrap(), 0b110110111);
            assert_eq!(buffer.size(), 3);
        }
    }

    #[test]
    fn test_shift() {
        let mut small = BitBuffer::from_number(0b10111011011101011, None).unwrap();
        let mut big = wide();
        big.push_fit(0b10111011011101011).unwrap();

        for buffer in [&mut small, &mut big] {
            assert_eq!(buffer.shift(5).unwrap(), 0b10111);
            assert_eq!(buffer.shift(9).unwrap(), 0b11011101);
            assert_eq!(buffer.to_u64().unwrap(), 0b011);
        }
    }

    #[test]
    fn test_from_bytes() {
        let data = [0x42, 0x00];
        assert_eq!(
            BitBuffer::from_bytes(&data, Endian::Big).to_u64().unwrap(),
            16896
        );
        assert_eq!(
            BitBuffer::from_bytes(&data, Endian::Little)
                .to_u64()
                .unwrap(),
            66
        );
    }

    #[test]
    fn test_from_number() {
        let buffer = BitBuffer::from_number(42, None).unwrap();
        assert_eq!(buffer.size(), 6);
        assert_eq!(buffer.to_u64().unwrap(), 42);
    }

    #[test]
    fn test_wide_bytes_round_trip() {
        let data: Vec<u8> = (1..=12).collect();
        for endian in [Endian::Big, Endian::Little] {
            let buffer = BitBuffer::from_bytes(&data, endian);
            assert!(buffer.is_big());
            assert_eq!(buffer.to_bytes(endian), data);
        }
        assert!(BitBuffer::from_bytes(&data, Endian::Big).to_u64().is_err());
    }

    #[test]
    fn test_to_bytes_pads_high_byte() {
        let buffer = BitBuffer::from_number(0b1_0000_0001, None).unwrap();
        assert_eq!(buffer.to_bytes(Endian::Big), vec![0x01, 0x01]);
        assert_eq!(buffer.to_bytes(Endian::Little), vec![0x01, 0x01]);
    }

    #[test]
    fn test_from_biguint() {
        let n = BigUint::from(1u8) << 70usize;
        let buffer = BitBuffer::from_biguint(&n, None).unwrap();
        assert_eq!(buffer.size(), 71);
        assert!(buffer.is_big());
        assert_eq!(buffer.to_biguint(), n);

        assert!(BitBuffer::from_biguint(&n, Some(16)).is_err());
    }

    #[test]
    fn test_take_too_many_bits() {
        let mut buffer = BitBuffer::from_number(3, Some(2)).unwrap();
        assert_eq!(
            buffer.pop(3).unwrap_err().kind(),
            crate::errors::ErrorKind::InvalidState
        );
        assert_eq!(
            buffer.shift(65).unwrap_err().kind(),
            crate::errors::ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_native_capacity() {
        let mut buffer = BitBuffer::new(8);
        buffer.push(0, 64).unwrap();
        assert_eq!(
            buffer.push(1, 1).unwrap_err().kind(),
            crate::errors::ErrorKind::InvalidState
        );
    }
}
