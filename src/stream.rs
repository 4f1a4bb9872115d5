//! Bit-granular reads and writes over a [`ByteStream`].
//!
//! A [`BitStream`] keeps at most one partially used byte between calls. Bits
//! are taken from (and placed into) that byte starting at its least
//! significant end, so equal-width writes and reads round trip. Whole-byte
//! requests made while no byte is open skip the bit machinery entirely.

use std::io::SeekFrom;

use tracing::debug;

use crate::{
    bit_buffer::BitBuffer,
    bits::{BITMASK, Endian, NATIVE_BITS, WORD_BYTES, low_mask, sign_extend},
    errors::{Error, Result},
    source::ByteStream,
};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// The byte currently being consumed or filled.
#[derive(Debug, Clone, Copy)]
struct PendingByte {
    byte: u8,
    used: usize,
    direction: Direction,
}

/// Bit-level reader/writer wrapping a byte source/sink.
///
/// Dropping the stream flushes a partially written byte, zero padded, the
/// same way [`align`](Self::align) does. Write errors at that point are
/// ignored; call [`align`](Self::align) or [`close`](Self::close) to see them.
pub struct BitStream<'a> {
    source: Box<dyn ByteStream + 'a>,
    pending: Option<PendingByte>,
    endian: Endian,
}

impl<'a> BitStream<'a> {
    /// Wraps `source`. Pass `&mut source` to keep ownership with the caller.
    pub fn new(source: impl ByteStream + 'a) -> Self {
        Self {
            source: Box::new(source),
            pending: None,
            endian: Endian::Big,
        }
    }

    /// Sets the byte order used by calls that do not name one.
    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// True when no byte is partially consumed or filled.
    pub fn is_aligned(&self) -> bool {
        self.pending.is_none()
    }

    pub fn is_writable(&self) -> bool {
        self.source.is_writable()
    }

    pub fn is_readable(&self) -> bool {
        self.source.is_readable()
    }

    /// True when every bit has been read: no unread bits remain in the open
    /// byte and the source is exhausted.
    pub fn at_end(&mut self) -> Result<bool> {
        if let Some(pending) = self.pending {
            if pending.direction == Direction::Read {
                return Ok(false);
            }
        }
        self.source.at_end()
    }

    /// Byte offset of the underlying source.
    pub fn position(&mut self) -> Result<u64> {
        self.source.tell()
    }

    /// Drops the open byte: unread bits are lost, unwritten bits are flushed
    /// padded with zero bits. Callers needing other padding must write it
    /// explicitly before aligning.
    pub fn align(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            match pending.direction {
                Direction::Read => {
                    debug!(dropped = 8 - pending.used, "align discards unread bits");
                }
                Direction::Write => {
                    debug!(padding = 8 - pending.used, "align flushes partial byte");
                    self.source.write_bytes(&[pending.byte])?;
                }
            }
        }
        Ok(())
    }

    /// Aligns, then moves the source offset.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.align()?;
        self.source.seek(pos)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.align()?;
        self.source.rewind()
    }

    /// Flushes any partial byte and closes the source.
    pub fn close(&mut self) -> Result<()> {
        self.align()?;
        self.source.close()
    }

    fn next_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.source.read_bytes(&mut byte)?;
        Ok(byte[0])
    }

    fn open_for(&mut self, direction: Direction) -> Result<Option<PendingByte>> {
        match self.pending {
            Some(pending) if pending.direction != direction => Err(Error::state(
                "cannot mix bit reads and writes inside one byte",
            )),
            pending => Ok(pending),
        }
    }

    /// Reads `n` bits (any width) in the given byte order.
    pub fn read_buffer(&mut self, n: usize, endian: Endian) -> Result<BitBuffer> {
        self.open_for(Direction::Read)?;
        if self.pending.is_none() && n % 8 == 0 {
            let bytes = self.read_chunked(n / 8)?;
            return Ok(BitBuffer::from_bytes(&bytes, endian));
        }

        let mut out = BitBuffer::new(n);
        self.read_into(&mut out, n, endian)?;
        Ok(out)
    }

    fn read_into(&mut self, out: &mut BitBuffer, n: usize, endian: Endian) -> Result<()> {
        if n == 0 {
            return Ok(());
        }

        let mut pending = match self.pending {
            Some(pending) => pending,
            None => PendingByte {
                byte: self.next_byte()?,
                used: 0,
                direction: Direction::Read,
            },
        };

        let remaining = 8 - pending.used;
        if n <= remaining {
            let bits = pending.byte & BITMASK[n - 1];
            pending.byte = pending.byte.checked_shr(n as u32).unwrap_or(0);
            pending.used += n;
            self.pending = (pending.used < 8).then_some(pending);
            return append(out, bits as u64, n, endian);
        }

        append(out, (pending.byte & BITMASK[remaining - 1]) as u64, remaining, endian)?;
        self.pending = None;

        let mut left = n - remaining;
        for _ in 0..left / 8 {
            let byte = self.next_byte()?;
            append(out, byte as u64, 8, endian)?;
        }
        left %= 8;

        self.read_into(out, left, endian)
    }

    /// Reads up to 64 bits in the stream's default byte order.
    pub fn read_bits(&mut self, n: usize) -> Result<u64> {
        self.read_bits_with(n, self.endian)
    }

    /// Reads up to 64 bits in the given byte order.
    pub fn read_bits_with(&mut self, n: usize, endian: Endian) -> Result<u64> {
        if n > NATIVE_BITS {
            return Err(Error::argument(format!(
                "cannot read {n} bits into a native integer"
            )));
        }
        self.read_buffer(n, endian)?.to_u64()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.open_for(Direction::Read)?;
        if self.pending.is_none() {
            return self.read_chunked(n);
        }
        let bits = n
            .checked_mul(8)
            .ok_or_else(|| Error::argument(format!("cannot read {n} bytes")))?;
        Ok(self.read_buffer(bits, Endian::Big)?.to_bytes(Endian::Big))
    }

    /// Whole-byte read that grows its buffer one chunk at a time, so a
    /// length taken from the input cannot allocate past the data on hand.
    fn read_chunked(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(n.min(READ_CHUNK));
        while bytes.len() < n {
            let start = bytes.len();
            bytes.resize(start + (n - start).min(READ_CHUNK), 0);
            self.source.read_bytes(&mut bytes[start..])?;
        }
        Ok(bytes)
    }

    /// Aligns to the next byte boundary, then reads `n` raw bytes.
    pub fn read_aligned_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.align()?;
        self.read_bytes(n)
    }

    /// Aligns, then reads every remaining byte.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        self.align()?;
        let mut bytes = Vec::new();
        while !self.source.at_end()? {
            bytes.push(self.next_byte()?);
        }
        Ok(bytes)
    }

    /// Reads bytes up to (not including) the next zero byte.
    pub fn read_cstring(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => return Ok(bytes),
                byte => bytes.push(byte),
            }
        }
    }

    fn read_word(&mut self, size: usize, endian: Endian) -> Result<u64> {
        if !self.is_aligned() {
            return self.read_bits_with(size * 8, endian);
        }

        let mut bytes = [0u8; WORD_BYTES];
        let bytes = &mut bytes[..size];
        self.source.read_bytes(bytes)?;
        let fold = |acc: u64, &byte: &u8| (acc << 8) | byte as u64;
        Ok(match endian {
            Endian::Big => bytes.iter().fold(0, fold),
            Endian::Little => bytes.iter().rev().fold(0, fold),
        })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_word(1, Endian::Big)? as u8)
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        Ok(self.read_word(2, endian)? as u16)
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        Ok(self.read_word(4, endian)? as u32)
    }

    /// Two 32-bit reads combined as `(high << 32) | low`.
    pub fn read_u64(&mut self, endian: Endian) -> Result<u64> {
        let (high, low) = match endian {
            Endian::Big => {
                let high = self.read_u32(endian)?;
                (high, self.read_u32(endian)?)
            }
            Endian::Little => {
                let low = self.read_u32(endian)?;
                (self.read_u32(endian)?, low)
            }
        };
        Ok(((high as u64) << 32) | low as u64)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(sign_extend(self.read_u8()? as u64, 8) as i8)
    }

    pub fn read_i16(&mut self, endian: Endian) -> Result<i16> {
        Ok(sign_extend(self.read_u16(endian)? as u64, 16) as i16)
    }

    pub fn read_i32(&mut self, endian: Endian) -> Result<i32> {
        Ok(sign_extend(self.read_u32(endian)? as u64, 32) as i32)
    }

    pub fn read_i64(&mut self, endian: Endian) -> Result<i64> {
        Ok(self.read_u64(endian)? as i64)
    }

    pub fn read_f32(&mut self, endian: Endian) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(endian)?))
    }

    pub fn read_f64(&mut self, endian: Endian) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64(endian)?))
    }

    /// Writes every bit held by `bits` in the given byte order.
    pub fn write_buffer(&mut self, mut bits: BitBuffer, endian: Endian) -> Result<()> {
        self.open_for(Direction::Write)?;
        let mut left = bits.size();

        if self.pending.is_none() && left % 8 == 0 {
            for word in bits.to_bytes(endian).chunks(WORD_BYTES) {
                self.source.write_bytes(word)?;
            }
            return Ok(());
        }

        while left > 0 {
            let mut pending = self.pending.take().unwrap_or(PendingByte {
                byte: 0,
                used: 0,
                direction: Direction::Write,
            });

            let take = (8 - pending.used).min(left);
            let chunk = match endian {
                Endian::Big => bits.shift(take)?,
                Endian::Little => bits.pop(take)?,
            };
            pending.byte |= (chunk as u8) << pending.used;
            pending.used += take;
            left -= take;

            if pending.used == 8 {
                self.source.write_bytes(&[pending.byte])?;
            } else {
                self.pending = Some(pending);
            }
        }
        Ok(())
    }

    /// Writes the low `n` bits of `value` in the stream's default byte order.
    pub fn write_bits(&mut self, value: u64, n: usize) -> Result<()> {
        self.write_bits_with(value, n, self.endian)
    }

    /// Writes the low `n` bits of `value` (at most 64) in the given byte order.
    pub fn write_bits_with(&mut self, value: u64, n: usize, endian: Endian) -> Result<()> {
        if n > NATIVE_BITS {
            return Err(Error::argument(format!(
                "cannot write {n} bits from a native integer"
            )));
        }
        let bits = BitBuffer::from_number(value & low_mask(n), Some(n))?;
        self.write_buffer(bits, endian)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_bits(value as u64, 1)
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.open_for(Direction::Write)?;
        if self.pending.is_none() {
            self.source.write_bytes(bytes)?;
            return Ok(());
        }
        self.write_buffer(BitBuffer::from_bytes(bytes, Endian::Big), Endian::Big)
    }

    /// Aligns to the next byte boundary, then writes raw bytes.
    pub fn write_aligned_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.align()?;
        self.write_bytes(bytes)
    }

    /// Writes `bytes` followed by a zero byte.
    pub fn write_cstring(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.contains(&0) {
            return Err(Error::argument("c string contains a zero byte"));
        }
        self.write_bytes(bytes)?;
        self.write_u8(0)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bits_with(value as u64, 8, Endian::Big)
    }

    pub fn write_u16(&mut self, value: u16, endian: Endian) -> Result<()> {
        self.write_bits_with(value as u64, 16, endian)
    }

    pub fn write_u32(&mut self, value: u32, endian: Endian) -> Result<()> {
        self.write_bits_with(value as u64, 32, endian)
    }

    /// Mirror of [`read_u64`](Self::read_u64): two 32-bit halves.
    pub fn write_u64(&mut self, value: u64, endian: Endian) -> Result<()> {
        let (high, low) = ((value >> 32) as u32, value as u32);
        match endian {
            Endian::Big => {
                self.write_u32(high, endian)?;
                self.write_u32(low, endian)
            }
            Endian::Little => {
                self.write_u32(low, endian)?;
                self.write_u32(high, endian)
            }
        }
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_i16(&mut self, value: i16, endian: Endian) -> Result<()> {
        self.write_u16(value as u16, endian)
    }

    pub fn write_i32(&mut self, value: i32, endian: Endian) -> Result<()> {
        self.write_u32(value as u32, endian)
    }

    pub fn write_i64(&mut self, value: i64, endian: Endian) -> Result<()> {
        self.write_u64(value as u64, endian)
    }

    pub fn write_f32(&mut self, value: f32, endian: Endian) -> Result<()> {
        self.write_u32(value.to_bits(), endian)
    }

    pub fn write_f64(&mut self, value: f64, endian: Endian) -> Result<()> {
        self.write_u64(value.to_bits(), endian)
    }
}

impl Drop for BitStream<'_> {
    fn drop(&mut self) {
        if let Some(PendingByte {
            byte,
            direction: Direction::Write,
            ..
        }) = self.pending.take()
        {
            let _ = self.source.write_bytes(&[byte]);
        }
    }
}

fn append(out: &mut BitBuffer, bits: u64, width: usize, endian: Endian) -> Result<()> {
    match endian {
        Endian::Big => out.push(bits, width),
        Endian::Little => out.unshift(bits, width),
    }
}
