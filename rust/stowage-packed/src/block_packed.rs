//! Block-wise delta compression of `i64` sequences.
//!
//! Values are split into fixed-size blocks. Each block stores its minimum and the
//! residuals `value - min` packed at the width of the largest residual:
//!
//! ```text
//! block := token [min] residuals
//! token := (bits_per_value << 1) | (min == 0 ? 1 : 0)        1 byte
//! min   := block vlong of zigzag(min) - 1                    only if min != 0
//! residuals := Packed layout, byte_count(n, bits_per_value)  only if bits_per_value > 0
//! ```
//!
//! The block vlong is a little-endian base-128 integer of at most 9 bytes: the 9th byte,
//! when present, carries 8 full bits.

use std::io::{Read, Write};

use stowage_bits::{max_value, unsigned_bits_required, zigzag_decode, zigzag_encode};
use stowage_common::{Result, error::Error, verify_state};
use stowage_io::DataInput;

use crate::bulk::packed_operation;
use crate::format::Format;
use crate::ints::{
    MutableArray, NullMutable, PackedReader, VERSION_CURRENT, check_block_size,
    get_reader_no_header, num_blocks,
};
use crate::long_values::LongValues;

pub const MIN_BLOCK_SIZE: usize = 64;
pub const MAX_BLOCK_SIZE: usize = 1 << (30 - 3);

pub(crate) const MIN_VALUE_EQUALS_0: u8 = 1;
pub(crate) const BPV_SHIFT: u32 = 1;

pub(crate) fn write_block_vlong<W: Write + ?Sized>(out: &mut W, mut value: u64) -> Result<()> {
    let mut written = 0;
    while value & !0x7F != 0 && written < 8 {
        out.write_all(&[((value & 0x7F) | 0x80) as u8])?;
        value >>= 7;
        written += 1;
    }
    out.write_all(&[value as u8])?;
    Ok(())
}

pub(crate) fn read_block_vlong<R: Read + ?Sized>(input: &mut R) -> Result<u64> {
    let mut value = 0u64;
    for shift in (0..56).step_by(7) {
        let b = input.read_byte()?;
        value |= ((b & 0x7F) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok(value);
        }
    }
    let b = input.read_byte()?;
    Ok(value | ((b as u64) << 56))
}

/// Reads a block token, returning the width and whether the block minimum is zero.
pub(crate) fn read_token<R: Read + ?Sized>(input: &mut R) -> Result<(u32, bool)> {
    let token = input.read_byte()?;
    let bits_per_value = (token >> BPV_SHIFT) as u32;
    if bits_per_value > 64 {
        log::debug!("corrupted block token {token:#x}");
        return Err(Error::invalid_format(
            "block token",
            format!("Corrupted: bits per value {bits_per_value} > 64"),
        ));
    }
    Ok((bits_per_value, token & MIN_VALUE_EQUALS_0 != 0))
}

/// Buffering shared by the block writers.
pub(crate) struct BlockWriterCore<W: Write> {
    pub(crate) out: W,
    pub(crate) values: Vec<i64>,
    pub(crate) residuals: Vec<u64>,
    blocks: Vec<u8>,
    pub(crate) off: usize,
    pub(crate) ord: u64,
    pub(crate) finished: bool,
}

impl<W: Write> BlockWriterCore<W> {
    pub(crate) fn new(out: W, block_size: usize) -> Result<BlockWriterCore<W>> {
        check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        Ok(BlockWriterCore {
            out,
            values: vec![0; block_size],
            residuals: vec![0; block_size],
            blocks: Vec::new(),
            off: 0,
            ord: 0,
            finished: false,
        })
    }

    pub(crate) fn is_full(&self) -> bool {
        self.off == self.values.len()
    }

    pub(crate) fn push(&mut self, value: i64) {
        self.values[self.off] = value;
        self.off += 1;
        self.ord += 1;
    }

    /// Packs `residuals[..off]` at `bits_per_value` bits.
    pub(crate) fn write_values(&mut self, bits_per_value: u32) -> Result<()> {
        let op = packed_operation(bits_per_value);
        let iterations = self.values.len() / op.byte_value_count();
        let block_bytes = iterations * op.byte_block_count();
        if self.blocks.len() < block_bytes {
            self.blocks.resize(block_bytes, 0);
        }
        self.residuals[self.off..].fill(0);
        op.encode_bytes(&self.residuals, &mut self.blocks, iterations);
        let byte_count = Format::Packed.byte_count(self.off, bits_per_value);
        self.out.write_all(&self.blocks[..byte_count])?;
        Ok(())
    }
}

/// Append-only writer of block-compressed `i64` values.
pub struct BlockPackedWriter<W: Write> {
    core: BlockWriterCore<W>,
}

impl<W: Write> BlockPackedWriter<W> {
    /// `block_size` must be a power of two in `MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE`.
    pub fn new(out: W, block_size: usize) -> Result<BlockPackedWriter<W>> {
        Ok(BlockPackedWriter {
            core: BlockWriterCore::new(out, block_size)?,
        })
    }

    pub fn add(&mut self, value: i64) -> Result<()> {
        verify_state!("add after finish", !self.core.finished);
        if self.core.is_full() {
            self.flush()?;
        }
        self.core.push(value);
        Ok(())
    }

    /// Flushes the pending partial block. No value may be added afterwards.
    pub fn finish(&mut self) -> Result<()> {
        verify_state!("finish called twice", !self.core.finished);
        if self.core.off > 0 {
            self.flush()?;
        }
        self.core.out.flush()?;
        self.core.finished = true;
        Ok(())
    }

    /// Number of values added so far.
    pub fn ord(&self) -> u64 {
        self.core.ord
    }

    pub fn into_inner(self) -> W {
        self.core.out
    }

    fn flush(&mut self) -> Result<()> {
        let core = &mut self.core;
        let values = &core.values[..core.off];
        let mut min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);

        let delta = max.wrapping_sub(min) as u64;
        let bits_required = if delta == 0 {
            0
        } else {
            unsigned_bits_required(delta)
        };
        if bits_required == 64 {
            min = 0;
        } else if min > 0 {
            // smallest min keeping residuals in range, for a shorter vlong
            min = max.saturating_sub(max_value(bits_required) as i64).max(0);
        }

        let token = ((bits_required as u8) << BPV_SHIFT) | u8::from(min == 0);
        core.out.write_all(&[token])?;
        if min != 0 {
            write_block_vlong(&mut core.out, zigzag_encode(min).wrapping_sub(1))?;
        }
        if bits_required > 0 {
            for (residual, &v) in core.residuals.iter_mut().zip(&core.values[..core.off]) {
                *residual = v.wrapping_sub(min) as u64;
            }
            core.write_values(bits_required)?;
        }
        log::trace!(
            "flushed block of {} values at {} bits (min {})",
            core.off,
            bits_required,
            min
        );
        core.off = 0;
        Ok(())
    }
}

/// Sequential reader of a stream written by [`BlockPackedWriter`].
pub struct BlockPackedReaderIterator<R: Read> {
    input: R,
    block_size: usize,
    values: Vec<i64>,
    raw: Vec<u64>,
    blocks: Vec<u8>,
    value_count: u64,
    off: usize,
    ord: u64,
}

impl<R: Read> BlockPackedReaderIterator<R> {
    pub fn new(
        input: R,
        block_size: usize,
        value_count: u64,
    ) -> Result<BlockPackedReaderIterator<R>> {
        check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        Ok(BlockPackedReaderIterator {
            input,
            block_size,
            values: vec![0; block_size],
            raw: vec![0; block_size],
            blocks: Vec::new(),
            value_count,
            off: block_size,
            ord: 0,
        })
    }

    /// Restarts reading from `input`, which holds `value_count` values.
    pub fn reset(&mut self, input: R, value_count: u64) {
        self.input = input;
        self.value_count = value_count;
        self.off = self.block_size;
        self.ord = 0;
    }

    /// Number of values consumed so far.
    pub fn ord(&self) -> u64 {
        self.ord
    }

    /// Skips `count` values, decoding at most the block the skip ends in.
    pub fn skip_values(&mut self, mut count: u64) -> Result<()> {
        if self.ord.checked_add(count).is_none_or(|end| end > self.value_count) {
            return Err(end_of_stream());
        }

        // 1. skip buffered values
        let buffered = count.min((self.block_size - self.off) as u64);
        self.off += buffered as usize;
        self.ord += buffered;
        count -= buffered;
        if count == 0 {
            return Ok(());
        }

        // 2. skip whole blocks without decoding them
        debug_assert_eq!(self.off, self.block_size);
        while count >= self.block_size as u64 {
            let (bits_per_value, min_is_zero) = read_token(&mut self.input)?;
            if !min_is_zero {
                read_block_vlong(&mut self.input)?;
            }
            if bits_per_value > 0 {
                let block_bytes = Format::Packed.byte_count(self.block_size, bits_per_value);
                self.input.skip_bytes(block_bytes as u64)?;
            }
            self.ord += self.block_size as u64;
            count -= self.block_size as u64;
        }
        if count == 0 {
            return Ok(());
        }

        // 3. skip into the last block
        self.refill()?;
        self.ord += count;
        self.off += count as usize;
        Ok(())
    }

    pub fn next_value(&mut self) -> Result<i64> {
        if self.ord == self.value_count {
            return Err(end_of_stream());
        }
        if self.off == self.block_size {
            self.refill()?;
        }
        let value = self.values[self.off];
        self.off += 1;
        self.ord += 1;
        Ok(value)
    }

    /// Returns between 1 and `count` of the next values, never crossing a block.
    pub fn next_slice(&mut self, count: usize) -> Result<&[i64]> {
        debug_assert!(count > 0);
        if self.ord == self.value_count {
            return Err(end_of_stream());
        }
        if self.off == self.block_size {
            self.refill()?;
        }
        let count = count
            .min(self.block_size - self.off)
            .min((self.value_count - self.ord) as usize);
        let start = self.off;
        self.off += count;
        self.ord += count as u64;
        Ok(&self.values[start..start + count])
    }

    fn refill(&mut self) -> Result<()> {
        let (bits_per_value, min_is_zero) = read_token(&mut self.input)?;
        let min = if min_is_zero {
            0
        } else {
            zigzag_decode(read_block_vlong(&mut self.input)?.wrapping_add(1))
        };

        if bits_per_value == 0 {
            self.values.fill(min);
        } else {
            let op = packed_operation(bits_per_value);
            let iterations = self.block_size / op.byte_value_count();
            let block_bytes = iterations * op.byte_block_count();
            if self.blocks.len() < block_bytes {
                self.blocks.resize(block_bytes, 0);
            }
            let value_count = (self.value_count - self.ord).min(self.block_size as u64) as usize;
            let byte_count = Format::Packed.byte_count(value_count, bits_per_value);
            self.input.read_bytes(&mut self.blocks[..byte_count])?;
            self.blocks[byte_count..].fill(0);
            op.decode_bytes(&self.blocks, &mut self.raw, iterations);
            for (value, &raw) in self.values.iter_mut().zip(&self.raw[..value_count]) {
                *value = min.wrapping_add(raw as i64);
            }
        }
        self.off = 0;
        Ok(())
    }
}

impl<R: Read> Iterator for BlockPackedReaderIterator<R> {
    type Item = Result<i64>;

    fn next(&mut self) -> Option<Result<i64>> {
        if self.ord >= self.value_count {
            return None;
        }
        Some(self.next_value())
    }
}

pub(crate) fn end_of_stream() -> Error {
    Error::io(
        "block reader",
        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past end"),
    )
}

/// Random-access reader loading a whole [`BlockPackedWriter`] stream into memory.
#[derive(Debug, Clone)]
pub struct BlockPackedReader {
    block_shift: u32,
    block_mask: u64,
    value_count: u64,
    min_values: Vec<i64>,
    sub_readers: Vec<MutableArray>,
}

impl BlockPackedReader {
    pub fn new<R: Read + ?Sized>(
        input: &mut R,
        block_size: usize,
        value_count: u64,
    ) -> Result<BlockPackedReader> {
        let block_shift = check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        let num_blocks = num_blocks(value_count, block_size)?;
        let mut min_values = Vec::with_capacity(num_blocks);
        let mut sub_readers = Vec::with_capacity(num_blocks);
        for i in 0..num_blocks {
            let (bits_per_value, min_is_zero) = read_token(input)?;
            min_values.push(if min_is_zero {
                0
            } else {
                zigzag_decode(read_block_vlong(input)?.wrapping_add(1))
            });
            let size = (value_count - (i as u64) * block_size as u64).min(block_size as u64);
            let sub_reader = if bits_per_value == 0 {
                MutableArray::Null(NullMutable::new(size as usize))
            } else {
                get_reader_no_header(
                    input,
                    Format::Packed,
                    VERSION_CURRENT,
                    size as usize,
                    bits_per_value,
                )?
            };
            sub_readers.push(sub_reader);
        }
        Ok(BlockPackedReader {
            block_shift,
            block_mask: block_size as u64 - 1,
            value_count,
            min_values,
            sub_readers,
        })
    }

    pub fn size(&self) -> u64 {
        self.value_count
    }

    #[inline]
    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.value_count);
        let block = (index >> self.block_shift) as usize;
        let idx = (index & self.block_mask) as usize;
        self.min_values[block].wrapping_add(self.sub_readers[block].get(idx) as i64)
    }
}

impl LongValues for BlockPackedReader {
    fn get(&self, index: u64) -> i64 {
        BlockPackedReader::get(self, index)
    }
}
