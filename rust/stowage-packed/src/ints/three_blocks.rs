//! 24-bit and 48-bit arrays storing every value as three consecutive native words.

use std::io::{Read, Write};

use byteorder::{BE, ByteOrder};
use stowage_common::Result;

use super::{PackedMutable, PackedReader, read_bytes};
use crate::format::THREE_BLOCKS_MAX_SIZE;

/// 24-bit values, each stored as three bytes, most significant first.
#[derive(Debug, Clone)]
pub struct Packed8ThreeBlocks {
    blocks: Vec<u8>,
}

impl Packed8ThreeBlocks {
    /// # Panics
    ///
    /// If `value_count` exceeds [`THREE_BLOCKS_MAX_SIZE`].
    pub fn new(value_count: usize) -> Packed8ThreeBlocks {
        assert!(value_count <= THREE_BLOCKS_MAX_SIZE, "too many values: {value_count}");
        Packed8ThreeBlocks {
            blocks: vec![0; value_count * 3],
        }
    }

    pub(crate) fn load<R: Read + ?Sized>(
        input: &mut R,
        value_count: usize,
    ) -> Result<Packed8ThreeBlocks> {
        Ok(Packed8ThreeBlocks {
            blocks: read_bytes(input, value_count * 3)?,
        })
    }
}

impl PackedReader for Packed8ThreeBlocks {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        let o = index * 3;
        ((self.blocks[o] as u64) << 16)
            | ((self.blocks[o + 1] as u64) << 8)
            | self.blocks[o + 2] as u64
    }

    fn size(&self) -> usize {
        self.blocks.len() / 3
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        let len = arr.len().min(self.size() - index);
        for (v, b) in arr[..len]
            .iter_mut()
            .zip(self.blocks[index * 3..(index + len) * 3].chunks_exact(3))
        {
            *v = ((b[0] as u64) << 16) | ((b[1] as u64) << 8) | b[2] as u64;
        }
        len
    }
}

impl PackedMutable for Packed8ThreeBlocks {
    fn bits_per_value(&self) -> u32 {
        24
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        let o = index * 3;
        self.blocks[o] = (value >> 16) as u8;
        self.blocks[o + 1] = (value >> 8) as u8;
        self.blocks[o + 2] = value as u8;
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        let len = arr.len().min(self.size() - index);
        for (b, &v) in self.blocks[index * 3..(index + len) * 3]
            .chunks_exact_mut(3)
            .zip(&arr[..len])
        {
            b[0] = (v >> 16) as u8;
            b[1] = (v >> 8) as u8;
            b[2] = v as u8;
        }
        len
    }

    fn fill(&mut self, from: usize, to: usize, value: u64) {
        let pattern = [(value >> 16) as u8, (value >> 8) as u8, value as u8];
        for b in self.blocks[from * 3..to * 3].chunks_exact_mut(3) {
            b.copy_from_slice(&pattern);
        }
    }

    fn clear(&mut self) {
        self.blocks.fill(0);
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        out.write_all(&self.blocks)?;
        Ok(())
    }
}

/// 48-bit values, each stored as three 16-bit words, most significant first.
#[derive(Debug, Clone)]
pub struct Packed16ThreeBlocks {
    blocks: Vec<u16>,
}

impl Packed16ThreeBlocks {
    /// # Panics
    ///
    /// If `value_count` exceeds [`THREE_BLOCKS_MAX_SIZE`].
    pub fn new(value_count: usize) -> Packed16ThreeBlocks {
        assert!(value_count <= THREE_BLOCKS_MAX_SIZE, "too many values: {value_count}");
        Packed16ThreeBlocks {
            blocks: vec![0; value_count * 3],
        }
    }

    pub(crate) fn load<R: Read + ?Sized>(
        input: &mut R,
        value_count: usize,
    ) -> Result<Packed16ThreeBlocks> {
        let bytes = read_bytes(input, value_count * 6)?;
        let mut blocks = vec![0u16; value_count * 3];
        BE::read_u16_into(&bytes, &mut blocks);
        Ok(Packed16ThreeBlocks { blocks })
    }

    #[inline]
    fn split(value: u64) -> [u16; 3] {
        [(value >> 32) as u16, (value >> 16) as u16, value as u16]
    }

    #[inline]
    fn join(b: &[u16]) -> u64 {
        ((b[0] as u64) << 32) | ((b[1] as u64) << 16) | b[2] as u64
    }
}

impl PackedReader for Packed16ThreeBlocks {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        let o = index * 3;
        Self::join(&self.blocks[o..o + 3])
    }

    fn size(&self) -> usize {
        self.blocks.len() / 3
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        let len = arr.len().min(self.size() - index);
        for (v, b) in arr[..len]
            .iter_mut()
            .zip(self.blocks[index * 3..(index + len) * 3].chunks_exact(3))
        {
            *v = Self::join(b);
        }
        len
    }
}

impl PackedMutable for Packed16ThreeBlocks {
    fn bits_per_value(&self) -> u32 {
        48
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        let o = index * 3;
        self.blocks[o..o + 3].copy_from_slice(&Self::split(value));
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        let len = arr.len().min(self.size() - index);
        for (b, &v) in self.blocks[index * 3..(index + len) * 3]
            .chunks_exact_mut(3)
            .zip(&arr[..len])
        {
            b.copy_from_slice(&Self::split(v));
        }
        len
    }

    fn fill(&mut self, from: usize, to: usize, value: u64) {
        let pattern = Self::split(value);
        for b in self.blocks[from * 3..to * 3].chunks_exact_mut(3) {
            b.copy_from_slice(&pattern);
        }
    }

    fn clear(&mut self) {
        self.blocks.fill(0);
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        let mut bytes = vec![0u8; self.blocks.len() * 2];
        BE::write_u16_into(&self.blocks, &mut bytes);
        out.write_all(&bytes)?;
        Ok(())
    }
}
