//! Block-wise compression of roughly monotonic `i64` sequences.
//!
//! Each block is modeled as the line `min + avg * i`; only the non-negative distance
//! of every value above that line is packed:
//!
//! ```text
//! block := zlong(min) float_bits(avg) vint(bits_per_value) residuals
//! ```
//!
//! `residuals` is omitted when `bits_per_value` is zero.

use std::io::{Read, Write};

use stowage_bits::unsigned_bits_required;
use stowage_common::{Result, error::Error, verify_state};
use stowage_io::{DataInput, DataOutput};

use crate::block_packed::{BlockWriterCore, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::format::Format;
use crate::ints::{
    MutableArray, NullMutable, PackedReader, VERSION_CURRENT, check_block_size,
    get_reader_no_header, num_blocks,
};
use crate::long_values::LongValues;

/// Value of the linear model `origin + average * index`, truncated toward zero.
#[inline]
pub(crate) fn expected(origin: i64, average: f32, index: u64) -> i64 {
    origin.wrapping_add((average * index as f32) as i64)
}

/// Average step of a block whose last value lies `span` above its first, over `count`
/// values. Shared by every monotonic encoder.
#[inline]
pub(crate) fn slope(span: f32, count: usize) -> f32 {
    if count <= 1 { 0.0 } else { span / (count - 1) as f32 }
}

/// Append-only writer of block-compressed, roughly monotonic `i64` values.
pub struct MonotonicBlockPackedWriter<W: Write> {
    core: BlockWriterCore<W>,
}

impl<W: Write> MonotonicBlockPackedWriter<W> {
    /// `block_size` must be a power of two in `MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE`.
    pub fn new(out: W, block_size: usize) -> Result<MonotonicBlockPackedWriter<W>> {
        Ok(MonotonicBlockPackedWriter {
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

    pub fn finish(&mut self) -> Result<()> {
        verify_state!("finish called twice", !self.core.finished);
        if self.core.off > 0 {
            self.flush()?;
        }
        self.core.out.flush()?;
        self.core.finished = true;
        Ok(())
    }

    pub fn ord(&self) -> u64 {
        self.core.ord
    }

    pub fn into_inner(self) -> W {
        self.core.out
    }

    fn flush(&mut self) -> Result<()> {
        let core = &mut self.core;
        let off = core.off;
        debug_assert!(off > 0);
        let values = &core.values[..off];
        let avg = slope(values[off - 1].wrapping_sub(values[0]) as f32, off);

        // lower the origin until no value lies below the line
        let mut min = values[0];
        for (i, &actual) in values.iter().enumerate().skip(1) {
            let line = expected(min, avg, i as u64);
            if line > actual {
                min = min.wrapping_sub(line.wrapping_sub(actual));
            }
        }

        // residuals wrapped below zero by overflow take the full width
        let mut max_delta = 0u64;
        for (i, (residual, &v)) in core.residuals.iter_mut().zip(values).enumerate() {
            *residual = v.wrapping_sub(expected(min, avg, i as u64)) as u64;
            max_delta = max_delta.max(*residual);
        }

        core.out.write_zlong(min)?;
        core.out.write_float_bits(avg)?;
        if max_delta == 0 {
            core.out.write_vint(0)?;
        } else {
            let bits = unsigned_bits_required(max_delta);
            core.out.write_vint(bits)?;
            core.write_values(bits)?;
        }
        log::trace!("flushed monotonic block of {off} values (min {min}, avg {avg})");
        core.off = 0;
        Ok(())
    }
}

/// Random-access reader loading a whole [`MonotonicBlockPackedWriter`] stream into
/// memory.
#[derive(Debug, Clone)]
pub struct MonotonicBlockPackedReader {
    block_shift: u32,
    block_mask: u64,
    value_count: u64,
    min_values: Vec<i64>,
    averages: Vec<f32>,
    sub_readers: Vec<MutableArray>,
}

impl MonotonicBlockPackedReader {
    pub fn new<R: Read + ?Sized>(
        input: &mut R,
        block_size: usize,
        value_count: u64,
    ) -> Result<MonotonicBlockPackedReader> {
        let block_shift = check_block_size(block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)?;
        let num_blocks = num_blocks(value_count, block_size)?;
        let mut min_values = Vec::with_capacity(num_blocks);
        let mut averages = Vec::with_capacity(num_blocks);
        let mut sub_readers = Vec::with_capacity(num_blocks);
        for i in 0..num_blocks {
            min_values.push(input.read_zlong()?);
            averages.push(input.read_float_bits()?);
            let bits_per_value = input.read_vint()?;
            if bits_per_value > 64 {
                log::debug!("corrupted monotonic block {i}: {bits_per_value} bits per value");
                return Err(Error::invalid_format(
                    "monotonic block",
                    format!("Corrupted: bits per value {bits_per_value} > 64"),
                ));
            }
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
        Ok(MonotonicBlockPackedReader {
            block_shift,
            block_mask: block_size as u64 - 1,
            value_count,
            min_values,
            averages,
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
        let idx = index & self.block_mask;
        expected(self.min_values[block], self.averages[block], idx)
            .wrapping_add(self.sub_readers[block].get(idx as usize) as i64)
    }
}

impl LongValues for MonotonicBlockPackedReader {
    fn get(&self, index: u64) -> i64 {
        MonotonicBlockPackedReader::get(self, index)
    }
}

#[cfg(test)]
mod tests {
    use stowage_common::error::ErrorKind;

    use super::*;

    fn round_trip(values: &[i64], block_size: usize) -> (Vec<u8>, MonotonicBlockPackedReader) {
        let mut writer = MonotonicBlockPackedWriter::new(Vec::new(), block_size).unwrap();
        for &v in values {
            writer.add(v).unwrap();
        }
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        let reader =
            MonotonicBlockPackedReader::new(&mut bytes.as_slice(), block_size, values.len() as u64)
                .unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(reader.get(i as u64), v, "index {i}");
        }
        (bytes, reader)
    }

    #[test]
    fn test_perfect_line_has_no_residuals() {
        let values: Vec<i64> = (0..64).map(|i| 1000 + 3 * i).collect();
        let (bytes, _) = round_trip(&values, 64);
        // zlong(1000) = 2 bytes, avg = 4 bytes, vint(0) = 1 byte
        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[6], 0);
    }

    #[test]
    fn test_noisy_sequences() {
        fastrand::seed(17);
        let mut value = -10_000i64;
        let values: Vec<i64> = (0..1000)
            .map(|_| {
                value += fastrand::i64(0..50);
                value
            })
            .collect();
        round_trip(&values, 128);

        // not monotonic at all
        let values: Vec<i64> = (0..300).map(|_| fastrand::i64(-1000..1000)).collect();
        round_trip(&values, 64);

        round_trip(&[5], 64);
        round_trip(&[], 64);
    }

    #[test]
    fn test_extreme_values() {
        round_trip(&[i64::MIN, 0, i64::MAX, -1, 7], 64);
    }

    #[test]
    fn test_corrupted_width() {
        let mut bytes = Vec::new();
        bytes.write_zlong(0).unwrap();
        bytes.write_float_bits(0.0).unwrap();
        bytes.write_vint(65).unwrap();
        let err = MonotonicBlockPackedReader::new(&mut bytes.as_slice(), 64, 10).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));
    }
}
