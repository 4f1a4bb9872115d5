//! Integer representations behind [`crate::bit_buffer::BitBuffer`].
//!
//! A buffer picks one backend when it is created and keeps it: [`NativeUInt`]
//! for widths that fit a machine word, [`BigUInt`] for anything wider. Both
//! produce identical bit-level results; only the arithmetic differs.

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::bits::{low_mask, shl, shr};

/// Unsigned integer operations a bit buffer needs from its representation.
///
/// Positions and widths are in bits. `width` arguments never exceed 64.
pub trait UIntBackend: fmt::Debug + Send + Sync {
    /// `value = (value << shift) | bits`
    fn shl_or(&mut self, shift: usize, bits: u64);

    /// `value |= bits << at`
    fn or_at(&mut self, bits: u64, at: usize);

    /// `value ^= bits << at`
    fn xor_at(&mut self, bits: u64, at: usize);

    /// `value >>= shift`
    fn shr(&mut self, shift: usize);

    /// `(value >> at) & ((1 << width) - 1)`
    fn extract(&self, at: usize, width: usize) -> u64;

    /// Number of significant bits in the value.
    fn significant_bits(&self) -> usize;

    fn to_biguint(&self) -> BigUint;
}

/// Machine-word representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeUInt(pub u64);

impl UIntBackend for NativeUInt {
    fn shl_or(&mut self, shift: usize, bits: u64) {
        self.0 = shl(self.0, shift) | bits;
    }

    fn or_at(&mut self, bits: u64, at: usize) {
        self.0 |= shl(bits, at);
    }

    fn xor_at(&mut self, bits: u64, at: usize) {
        self.0 ^= shl(bits, at);
    }

    fn shr(&mut self, shift: usize) {
        self.0 = shr(self.0, shift);
    }

    fn extract(&self, at: usize, width: usize) -> u64 {
        shr(self.0, at) & low_mask(width)
    }

    fn significant_bits(&self) -> usize {
        (u64::BITS - self.0.leading_zeros()) as usize
    }

    fn to_biguint(&self) -> BigUint {
        BigUint::from(self.0)
    }
}

/// Arbitrary-precision representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BigUInt(pub BigUint);

impl UIntBackend for BigUInt {
    fn shl_or(&mut self, shift: usize, bits: u64) {
        let shifted = &self.0 << shift;
        self.0 = shifted | BigUint::from(bits);
    }

    fn or_at(&mut self, bits: u64, at: usize) {
        self.0 |= BigUint::from(bits) << at;
    }

    fn xor_at(&mut self, bits: u64, at: usize) {
        self.0 ^= BigUint::from(bits) << at;
    }

    fn shr(&mut self, shift: usize) {
        self.0 >>= shift;
    }

    fn extract(&self, at: usize, width: usize) -> u64 {
        let part = (&self.0 >> at) & BigUint::from(low_mask(width));
        if part.is_zero() {
            return 0;
        }
        // masked to at most 64 bits, so a single digit remains
        part.iter_u64_digits().next().unwrap_or(0)
    }

    fn significant_bits(&self) -> usize {
        self.0.bits() as usize
    }

    fn to_biguint(&self) -> BigUint {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &mut dyn UIntBackend) -> Vec<u64> {
        backend.shl_or(3, 0b110);
        backend.shl_or(2, 0b11);
        let appended = backend.extract(0, 5);
        backend.or_at(0b1, 5);
        let high = backend.extract(5, 1);
        backend.xor_at(0b1, 5);
        let cleared = backend.extract(0, 64);
        backend.shr(2);
        vec![appended, high, cleared, backend.extract(0, 64)]
    }

    #[test]
    fn test_backends_agree() {
        let native = exercise(&mut NativeUInt::default());
        let big = exercise(&mut BigUInt::default());
        assert_eq!(native, vec![0b11011, 1, 0b11011, 0b110]);
        assert_eq!(native, big);
    }

    #[test]
    fn test_big_extract_above_word() {
        let mut big = BigUInt::default();
        big.shl_or(64, 0xAB);
        big.shl_or(8, 0xCD);
        assert_eq!(big.extract(8, 8), 0xAB);
        assert_eq!(big.extract(0, 8), 0xCD);
        assert_eq!(big.significant_bits(), 16);
    }

    #[test]
    fn test_native_shift_by_full_word() {
        let mut native = NativeUInt(0);
        native.shl_or(64, u64::MAX);
        assert_eq!(native.0, u64::MAX);
        assert_eq!(native.significant_bits(), 64);
    }
}
