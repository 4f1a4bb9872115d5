//! Low-level bit helpers shared by buffers and streams.

/// Masks keeping the low `n` bits of a byte, indexed by `n - 1`.
pub const BITMASK: [u8; 8] = [0x01, 0x03, 0x07, 0x0F, 0x1F, 0x3F, 0x7F, 0xFF];

/// Width in bits of the native machine integer used by small buffers.
pub const NATIVE_BITS: usize = u64::BITS as usize;

/// Number of bytes in a native word.
pub const WORD_BYTES: usize = NATIVE_BITS / 8;

/// Byte order used when a value spans more than one chunk of bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endian {
    /// The first chunk read is the most significant.
    #[default]
    Big,
    /// The first chunk read is the least significant.
    Little,
}

/// Returns a mask with the low `n` bits set (`n <= 64`).
pub fn low_mask(n: usize) -> u64 {
    if n >= NATIVE_BITS {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Minimal number of bits needed to represent `x`; zero needs one bit.
pub fn integer_size(x: u64) -> usize {
    if x == 0 {
        1
    } else {
        NATIVE_BITS - x.leading_zeros() as usize
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits == 0 || bits >= NATIVE_BITS {
        return value as i64;
    }
    let shift = NATIVE_BITS - bits;
    ((value << shift) as i64) >> shift
}

/// `value << n`, yielding zero once every bit has been shifted out.
pub(crate) fn shl(value: u64, n: usize) -> u64 {
    u32::try_from(n)
        .ok()
        .and_then(|n| value.checked_shl(n))
        .unwrap_or(0)
}

/// `value >> n`, yielding zero once every bit has been shifted out.
pub(crate) fn shr(value: u64, n: usize) -> u64 {
    u32::try_from(n)
        .ok()
        .and_then(|n| value.checked_shr(n))
        .unwrap_or(0)
}
