use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};

use crate::verify;

/// A cheaply cloneable, immutable view into a shared byte buffer.
///
/// Positional reads are big-endian and index relative to the start of the view.
/// They panic when the requested bytes fall outside of it, mirroring slice indexing.
#[derive(Clone)]
pub struct ByteSlice {
    data: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl ByteSlice {
    pub fn new(data: impl Into<Arc<[u8]>>) -> ByteSlice {
        let data = data.into();
        let len = data.len();
        ByteSlice {
            data,
            start: 0,
            len,
        }
    }

    pub fn empty() -> ByteSlice {
        ByteSlice::new(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.start + self.len]
    }

    /// Returns a sub-view sharing the same buffer.
    pub fn slice(&self, offset: usize, len: usize) -> std::io::Result<ByteSlice> {
        verify!(offset.checked_add(len).is_some_and(|end| end <= self.len));
        Ok(ByteSlice {
            data: self.data.clone(),
            start: self.start + offset,
            len,
        })
    }

    #[inline]
    pub fn read_u8_at(&self, pos: usize) -> u8 {
        self.as_slice()[pos]
    }

    #[inline]
    pub fn read_u16_at(&self, pos: usize) -> u16 {
        BigEndian::read_u16(&self.as_slice()[pos..pos + 2])
    }

    #[inline]
    pub fn read_u32_at(&self, pos: usize) -> u32 {
        BigEndian::read_u32(&self.as_slice()[pos..pos + 4])
    }

    #[inline]
    pub fn read_u64_at(&self, pos: usize) -> u64 {
        BigEndian::read_u64(&self.as_slice()[pos..pos + 8])
    }
}

impl std::fmt::Debug for ByteSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSlice")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl From<Vec<u8>> for ByteSlice {
    fn from(data: Vec<u8>) -> Self {
        ByteSlice::new(data)
    }
}

impl AsRef<[u8]> for ByteSlice {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Seekable sequential reader over a [`ByteSlice`].
///
/// Cloning yields an independent cursor over the same bytes.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    slice: ByteSlice,
    pos: usize,
}

impl MemoryInput {
    pub fn new(slice: impl Into<ByteSlice>) -> MemoryInput {
        MemoryInput {
            slice: slice.into(),
            pos: 0,
        }
    }

    /// Current read position relative to the start of the input.
    #[inline]
    pub fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.slice.len() as u64
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.slice.len() - self.pos
    }

    pub fn seek(&mut self, pos: u64) -> std::io::Result<()> {
        verify!(pos <= self.length());
        self.pos = pos as usize;
        Ok(())
    }

    /// Returns a view of `len` bytes starting at absolute `offset`, leaving the cursor
    /// untouched.
    pub fn random_access_slice(&self, offset: u64, len: u64) -> std::io::Result<ByteSlice> {
        verify!(offset <= usize::MAX as u64 && len <= usize::MAX as u64);
        self.slice.slice(offset as usize, len as usize)
    }

    /// Consumes the next `len` bytes as a shared view.
    pub fn read_slice(&mut self, len: usize) -> std::io::Result<ByteSlice> {
        if len > self.remaining() {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        let slice = self.slice.slice(self.pos, len)?;
        self.pos += len;
        Ok(slice)
    }
}

impl std::io::Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.slice.as_slice()[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::{DataInput, DataOutput};

    #[test]
    fn test_positional_reads() {
        let slice = ByteSlice::new(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);
        assert_eq!(slice.read_u8_at(0), 0x01);
        assert_eq!(slice.read_u16_at(1), 0x0203);
        assert_eq!(slice.read_u32_at(1), 0x02030405);
        assert_eq!(slice.read_u64_at(1), 0x0203040506070809);

        let sub = slice.slice(4, 3).unwrap();
        assert_eq!(sub.as_slice(), &[0x05, 0x06, 0x07]);
        assert_eq!(sub.read_u16_at(1), 0x0607);
        assert!(slice.slice(8, 2).is_err());
    }

    #[test]
    #[should_panic]
    fn test_read_past_view_panics() {
        let slice = ByteSlice::new(vec![0u8; 16]).slice(0, 4).unwrap();
        slice.read_u64_at(0);
    }

    #[test]
    fn test_memory_input_cursor() {
        let mut out = Vec::new();
        out.write_long(42).unwrap();
        out.write_vint(300).unwrap();
        out.write_bytes(&[9, 8, 7]).unwrap();

        let mut input = MemoryInput::new(out);
        assert_eq!(input.read_long().unwrap(), 42);
        assert_eq!(input.file_pointer(), 8);
        let mut copy = input.clone();
        assert_eq!(input.read_vint().unwrap(), 300);
        assert_eq!(copy.read_vint().unwrap(), 300);

        let tail = input.read_slice(3).unwrap();
        assert_eq!(tail.as_slice(), &[9, 8, 7]);
        assert_eq!(input.remaining(), 0);
        let mut buf = [0u8; 1];
        assert_eq!(input.read(&mut buf).unwrap(), 0);

        input.seek(0).unwrap();
        assert_eq!(input.read_long().unwrap(), 42);
        assert!(input.seek(100).is_err());
        assert_eq!(
            input.random_access_slice(10, 3).unwrap().as_slice(),
            &[9, 8, 7]
        );
    }
}
