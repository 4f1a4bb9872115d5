//! Byte-level sources and sinks a [`crate::stream::BitStream`] runs on.
//!
//! [`ByteStream`] is the whole contract the bit layer needs. Concrete
//! transports (files, sockets, compressed or encrypted wrappers) implement it
//! as adapters; [`MemoryStream`] and [`IoStream`] cover the common cases.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::errors::{Error, Result};

/// Minimal byte source/sink contract.
pub trait ByteStream {
    /// Fills `buf` completely, or fails with [`Error::EndOfStream`] when the
    /// source runs dry first.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Writes `bytes` and returns how many were written.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize>;

    /// True when no more bytes can be read.
    fn at_end(&mut self) -> Result<bool>;

    /// Current byte offset.
    fn tell(&mut self) -> Result<u64>;

    /// Moves the byte offset and returns the new one.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Releases the underlying resource; later calls fail.
    fn close(&mut self) -> Result<()>;

    fn is_readable(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(buf)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write_bytes(bytes)
    }

    fn at_end(&mut self) -> Result<bool> {
        (**self).at_end()
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_readable(&self) -> bool {
        (**self).is_readable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }
}

fn offset_from(base: u64, delta: i64) -> Result<u64> {
    base.checked_add_signed(delta)
        .ok_or_else(|| Error::argument(format!("cannot seek to {base} {delta:+}")))
}

/// Growable in-memory byte buffer with a cursor.
///
/// Writes overwrite bytes at the cursor and extend the buffer past its end.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream reading `data` from offset zero.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::state("stream is closed"));
        }
        Ok(())
    }
}

impl ByteStream for MemoryStream {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        let start = self.pos.min(self.data.len());
        let end = start + buf.len();
        if end > self.data.len() {
            self.pos = self.data.len();
            return Err(Error::EndOfStream);
        }

        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_open()?;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }

        let overlap = (self.data.len() - self.pos).min(bytes.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.pos += bytes.len();
        Ok(bytes.len())
    }

    fn at_end(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.pos >= self.data.len())
    }

    fn tell(&mut self) -> Result<u64> {
        self.check_open()?;
        Ok(self.pos as u64)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => offset_from(self.pos as u64, delta)?,
            SeekFrom::End(delta) => offset_from(self.data.len() as u64, delta)?,
        };
        self.pos = usize::try_from(target)
            .map_err(|_| Error::argument(format!("offset {target} is out of range")))?;
        Ok(target)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Adapter over any seekable `std::io` reader/writer (files, cursors).
#[derive(Debug)]
pub struct IoStream<T> {
    inner: Option<T>,
    writable: bool,
}

impl<T: Read + Write + Seek> IoStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Some(inner),
            writable: true,
        }
    }

    /// Marks the stream as read-only, so composing onto it is refused.
    pub fn read_only(inner: T) -> Self {
        Self {
            inner: Some(inner),
            writable: false,
        }
    }

    /// Returns the wrapped value, or `None` once closed.
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    fn inner(&mut self) -> Result<&mut T> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::state("stream is closed"))
    }
}

impl<T: Read + Write + Seek> ByteStream for IoStream<T> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner()?.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            _ => Error::Io(e),
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::state("stream is read-only"));
        }
        self.inner()?.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn at_end(&mut self) -> Result<bool> {
        let inner = self.inner()?;
        let here = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(here))?;
        Ok(here >= end)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.inner()?.stream_position()?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.inner()?.seek(pos)?)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush()?;
        }
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_memory_read_past_end() {
        let mut stream = MemoryStream::from_bytes(vec![1, 2, 3]);
        let mut buf = [0u8; 2];
        stream.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        assert!(!stream.at_end().unwrap());

        let err = stream.read_bytes(&mut buf).unwrap_err();
        assert!(err.is_end_of_stream());
        assert!(stream.at_end().unwrap());
    }

    #[test]
    fn test_memory_write_overwrites_then_extends() {
        let mut stream = MemoryStream::from_bytes(vec![1, 2, 3]);
        stream.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(stream.write_bytes(&[9, 8, 7]).unwrap(), 3);
        assert_eq!(stream.as_bytes(), &[1, 2, 9, 8, 7]);
        assert_eq!(stream.tell().unwrap(), 5);
    }

    #[test]
    fn test_memory_seek() {
        let mut stream = MemoryStream::from_bytes(vec![0; 10]);
        assert_eq!(stream.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(stream.seek(SeekFrom::Current(-3)).unwrap(), 5);
        assert!(stream.seek(SeekFrom::Current(-6)).is_err());
        stream.rewind().unwrap();
        assert_eq!(stream.tell().unwrap(), 0);
    }

    #[test]
    fn test_memory_closed() {
        let mut stream = MemoryStream::new();
        stream.close().unwrap();
        assert_eq!(
            stream.write_bytes(&[1]).unwrap_err().kind(),
            crate::errors::ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_io_stream() {
        let mut stream = IoStream::new(Cursor::new(vec![0xAA, 0xBB]));
        let mut buf = [0u8; 1];
        stream.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0xAA]);
        assert!(!stream.at_end().unwrap());
        assert_eq!(stream.tell().unwrap(), 1);

        stream.write_bytes(&[0xCC, 0xDD]).unwrap();
        assert!(stream.at_end().unwrap());
        assert!(stream.read_bytes(&mut buf).unwrap_err().is_end_of_stream());

        stream.close().unwrap();
        assert!(stream.tell().is_err());
    }

    #[test]
    fn test_io_stream_read_only() {
        let mut stream = IoStream::read_only(Cursor::new(vec![1]));
        assert!(!stream.is_writable());
        assert!(stream.write_bytes(&[2]).is_err());
    }
}
