//! Random-access codec for on-disk arrays at a small set of "rounded" widths.
//!
//! Values are written in the [`Packed`](Format::Packed) layout followed by three zero
//! bytes. Every supported width has a dedicated reader that decodes a value with at most
//! one unaligned big-endian load, a shift and a mask; the padding keeps those loads in
//! bounds for the last values.

use std::io::Write;

use stowage_common::{Result, error::Error, verify_state};
use stowage_io::ByteSlice;

use crate::bulk::{BulkOperation, packed_operation};
use crate::format::{DEFAULT_BUFFER_SIZE, Format};
use crate::long_values::LongValues;

pub const SUPPORTED_BITS_PER_VALUE: [u32; 14] =
    [1, 2, 4, 8, 12, 16, 20, 24, 28, 32, 40, 48, 56, 64];

/// Zero bytes written after the values.
pub const PADDING: usize = 3;

/// Rounds `bits_required` up to the next supported width.
pub fn round_bits(bits_required: u32) -> u32 {
    match SUPPORTED_BITS_PER_VALUE.binary_search(&bits_required) {
        Ok(_) => bits_required,
        Err(index) => SUPPORTED_BITS_PER_VALUE[index.min(SUPPORTED_BITS_PER_VALUE.len() - 1)],
    }
}

/// Supported width needed to store values in `0..=max_value`; negative values need 64.
pub fn bits_required(max_value: i64) -> u32 {
    round_bits(stowage_bits::bits_required(max_value))
}

pub fn unsigned_bits_required(max_value: u64) -> u32 {
    round_bits(stowage_bits::unsigned_bits_required(max_value))
}

/// Writes exactly `num_values` values at a supported width.
pub struct DirectWriter<W: Write> {
    out: W,
    num_values: u64,
    bits_per_value: u32,
    op: &'static BulkOperation,
    iterations: usize,
    next_blocks: Vec<u8>,
    next_values: Vec<u64>,
    off: usize,
    count: u64,
    finished: bool,
}

impl<W: Write> DirectWriter<W> {
    pub fn new(out: W, num_values: u64, bits_per_value: u32) -> Result<DirectWriter<W>> {
        if SUPPORTED_BITS_PER_VALUE.binary_search(&bits_per_value).is_err() {
            return Err(Error::invalid_arg(
                "bits_per_value",
                format!("unsupported direct width {bits_per_value}"),
            ));
        }
        let op = packed_operation(bits_per_value);
        let iterations =
            op.compute_iterations(num_values.min(i32::MAX as u64) as usize, DEFAULT_BUFFER_SIZE);
        Ok(DirectWriter {
            out,
            num_values,
            bits_per_value,
            op,
            iterations,
            next_blocks: vec![0; iterations * op.byte_block_count()],
            next_values: vec![0; iterations * op.byte_value_count()],
            off: 0,
            count: 0,
            finished: false,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    /// Adds the next value. Values must fit in the writer width.
    pub fn add(&mut self, value: i64) -> Result<()> {
        verify_state!("add after finish", !self.finished);
        verify_state!("write past end of stream", self.count < self.num_values);
        debug_assert!(
            self.bits_per_value == 64
                || (value >= 0 && value as u64 <= stowage_bits::max_value(self.bits_per_value))
        );
        self.next_values[self.off] = value as u64;
        self.off += 1;
        if self.off == self.next_values.len() {
            self.flush()?;
        }
        self.count += 1;
        Ok(())
    }

    /// Flushes the buffered values and writes the padding. Fails unless exactly
    /// `num_values` values were added.
    pub fn finish(&mut self) -> Result<()> {
        verify_state!("finish called twice", !self.finished);
        if self.count != self.num_values {
            return Err(Error::invalid_operation(format!(
                "Wrong number of values added, expected: {}, got: {}",
                self.num_values, self.count
            )));
        }
        self.flush()?;
        self.out.write_all(&[0; PADDING])?;
        self.out.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) -> Result<()> {
        self.op
            .encode_bytes(&self.next_values, &mut self.next_blocks, self.iterations);
        let byte_count = Format::Packed.byte_count(self.off, self.bits_per_value);
        self.out.write_all(&self.next_blocks[..byte_count])?;
        self.next_values.fill(0);
        self.off = 0;
        Ok(())
    }
}

type ReadFn = fn(&ByteSlice, u64) -> u64;

fn read1(data: &ByteSlice, index: u64) -> u64 {
    let shift = 7 - (index & 7);
    (data.read_u8_at((index >> 3) as usize) as u64 >> shift) & 0x1
}

fn read2(data: &ByteSlice, index: u64) -> u64 {
    let shift = (3 - (index & 3)) << 1;
    (data.read_u8_at((index >> 2) as usize) as u64 >> shift) & 0x3
}

fn read4(data: &ByteSlice, index: u64) -> u64 {
    let shift = ((index + 1) & 1) << 2;
    (data.read_u8_at((index >> 1) as usize) as u64 >> shift) & 0xF
}

fn read8(data: &ByteSlice, index: u64) -> u64 {
    data.read_u8_at(index as usize) as u64
}

fn read12(data: &ByteSlice, index: u64) -> u64 {
    let offset = (index * 12) >> 3;
    let shift = ((index + 1) & 1) << 2;
    (data.read_u16_at(offset as usize) as u64 >> shift) & 0xFFF
}

fn read16(data: &ByteSlice, index: u64) -> u64 {
    data.read_u16_at((index << 1) as usize) as u64
}

fn read20(data: &ByteSlice, index: u64) -> u64 {
    let offset = (index * 20) >> 3;
    let v = data.read_u32_at(offset as usize) as u64 >> 8;
    let shift = ((index + 1) & 1) << 2;
    (v >> shift) & 0xFFFFF
}

fn read24(data: &ByteSlice, index: u64) -> u64 {
    data.read_u32_at((index * 3) as usize) as u64 >> 8
}

fn read28(data: &ByteSlice, index: u64) -> u64 {
    let offset = (index * 28) >> 3;
    let shift = ((index + 1) & 1) << 2;
    (data.read_u32_at(offset as usize) as u64 >> shift) & 0xFFF_FFFF
}

fn read32(data: &ByteSlice, index: u64) -> u64 {
    data.read_u32_at((index << 2) as usize) as u64
}

fn read40(data: &ByteSlice, index: u64) -> u64 {
    data.read_u64_at((index * 5) as usize) >> 24
}

fn read48(data: &ByteSlice, index: u64) -> u64 {
    data.read_u64_at((index * 6) as usize) >> 16
}

fn read56(data: &ByteSlice, index: u64) -> u64 {
    data.read_u64_at((index * 7) as usize) >> 8
}

fn read64(data: &ByteSlice, index: u64) -> u64 {
    data.read_u64_at((index << 3) as usize)
}

/// Random-access reader of values written by [`DirectWriter`].
#[derive(Clone)]
pub struct DirectReader {
    data: ByteSlice,
    bits_per_value: u32,
    read: ReadFn,
}

impl DirectReader {
    /// Reads values of `bits_per_value` bits stored at byte `offset` of `slice`.
    pub fn new(slice: &ByteSlice, bits_per_value: u32, offset: u64) -> Result<DirectReader> {
        let read: ReadFn = match bits_per_value {
            1 => read1,
            2 => read2,
            4 => read4,
            8 => read8,
            12 => read12,
            16 => read16,
            20 => read20,
            24 => read24,
            28 => read28,
            32 => read32,
            40 => read40,
            48 => read48,
            56 => read56,
            64 => read64,
            _ => {
                return Err(Error::invalid_arg(
                    "bits_per_value",
                    format!("unsupported direct width {bits_per_value}"),
                ));
            }
        };
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&offset| offset <= slice.len())
            .ok_or_else(|| {
                Error::invalid_format("direct reader", format!("offset {offset} out of bounds"))
            })?;
        Ok(DirectReader {
            data: slice.slice(offset, slice.len() - offset)?,
            bits_per_value,
            read,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    #[inline]
    pub fn get(&self, index: u64) -> i64 {
        (self.read)(&self.data, index) as i64
    }
}

impl std::fmt::Debug for DirectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectReader")
            .field("bits_per_value", &self.bits_per_value)
            .field("len", &self.data.len())
            .finish()
    }
}

impl LongValues for DirectReader {
    fn get(&self, index: u64) -> i64 {
        DirectReader::get(self, index)
    }
}

#[cfg(test)]
mod tests {
    use stowage_common::error::ErrorKind;

    use super::*;

    fn write(values: &[i64], bits_per_value: u32) -> Vec<u8> {
        let mut writer =
            DirectWriter::new(Vec::new(), values.len() as u64, bits_per_value).unwrap();
        for &v in values {
            writer.add(v).unwrap();
        }
        writer.finish().unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_width_20_scenario() {
        let values = [0, 1_048_575, 1, 999_999, 500_000];
        let bytes = write(&values, 20);
        assert_eq!(bytes.len(), (5 * 20usize).div_ceil(8) + PADDING);
        assert_eq!(&bytes[bytes.len() - 3..], &[0, 0, 0]);

        let reader = DirectReader::new(&ByteSlice::from(bytes), 20, 0).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(reader.get(i as u64), v);
        }
    }

    #[test]
    fn test_every_width_with_offset() {
        fastrand::seed(2024);
        for bits in SUPPORTED_BITS_PER_VALUE {
            for count in [1, 7, 100, 1500] {
                let values: Vec<i64> = (0..count)
                    .map(|_| (fastrand::u64(..) & stowage_bits::max_value(bits)) as i64)
                    .collect();
                let mut bytes = vec![0xAB; 5];
                bytes.extend(write(&values, bits));
                assert_eq!(
                    bytes.len(),
                    5 + Format::Packed.byte_count(count, bits) + PADDING
                );
                let reader = DirectReader::new(&ByteSlice::from(bytes), bits, 5).unwrap();
                for (i, &v) in values.iter().enumerate() {
                    assert_eq!(reader.get(i as u64), v, "bits {bits} index {i}");
                }
            }
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_bits(3), 4);
        assert_eq!(round_bits(13), 16);
        assert_eq!(round_bits(41), 48);
        assert_eq!(round_bits(64), 64);
        assert_eq!(unsigned_bits_required(0), 1);
        assert_eq!(unsigned_bits_required(1000), 12);
        assert_eq!(bits_required(-1), 64);
        assert_eq!(bits_required(1 << 30), 32);
    }

    #[test]
    fn test_writer_errors() {
        assert!(DirectWriter::new(Vec::new(), 3, 3).is_err());
        let mut writer = DirectWriter::new(Vec::new(), 2, 8).unwrap();
        writer.add(1).unwrap();
        let err = writer.finish().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
        writer.add(2).unwrap();
        assert!(writer.add(3).is_err());
        writer.finish().unwrap();
        assert!(writer.finish().is_err());
        assert_eq!(writer.into_inner(), [1, 2, 0, 0, 0]);
    }

    #[test]
    fn test_reader_rejects_unsupported_width() {
        let data = ByteSlice::from(vec![0u8; 16]);
        assert!(DirectReader::new(&data, 3, 0).is_err());
        assert!(DirectReader::new(&data, 8, 17).is_err());
    }
}
