//! Random-access codec for large non-decreasing `i64` sequences.
//!
//! Values are split into blocks of `2^block_shift`. Each block is modeled as the line
//! `min + avg * i` and only the residuals above that line are stored, via
//! [`DirectWriter`], in the data stream. The meta stream holds one fixed-size record per
//! block:
//!
//! ```text
//! record := min:i64 avg:f32 offset:i64 bits_per_value:u8
//! ```
//!
//! `offset` is relative to the data position at the time the writer was created. A
//! block whose residuals are all zero has `bits_per_value == 0` and no data.
//!
//! The meta records give a cheap envelope for every value (see
//! [`DirectMonotonicReader::bounds`]), which lets [`DirectMonotonicReader::binary_search`]
//! skip most of the data reads.

use std::io::Read;

use stowage_common::{Result, error::Error, verify_arg, verify_state};
use stowage_io::{ByteSlice, DataInput, DataOutput, IndexOutput};

use crate::direct::{self, DirectReader, DirectWriter, SUPPORTED_BITS_PER_VALUE};
use crate::long_values::LongValues;
use crate::monotonic_block_packed::{expected, slope};

pub const MIN_BLOCK_SHIFT: u32 = 2;
pub const MAX_BLOCK_SHIFT: u32 = 22;

/// Size in bytes of one meta record.
pub const META_RECORD_LEN: u64 = 8 + 4 + 8 + 1;

fn num_blocks(num_values: u64, block_shift: u32) -> u64 {
    num_values.div_ceil(1 << block_shift)
}

/// Writes a non-decreasing sequence of exactly `num_values` values to a meta and a
/// data output.
pub struct DirectMonotonicWriter<M: IndexOutput, D: IndexOutput> {
    meta: M,
    data: D,
    num_values: u64,
    base_data_pointer: u64,
    buffer: Vec<i64>,
    buffer_size: usize,
    count: u64,
    previous: i64,
    finished: bool,
}

impl<M: IndexOutput, D: IndexOutput> DirectMonotonicWriter<M, D> {
    pub fn new(
        meta: M,
        data: D,
        num_values: u64,
        block_shift: u32,
    ) -> Result<DirectMonotonicWriter<M, D>> {
        verify_arg!(
            block_shift,
            (MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT).contains(&block_shift)
        );
        let buffer_len = num_values.min(1 << block_shift) as usize;
        let base_data_pointer = data.file_pointer();
        Ok(DirectMonotonicWriter {
            meta,
            data,
            num_values,
            base_data_pointer,
            buffer: vec![0; buffer_len],
            buffer_size: 0,
            count: 0,
            previous: i64::MIN,
            finished: false,
        })
    }

    /// Appends the next value, which must not be smaller than the previous one.
    pub fn add(&mut self, value: i64) -> Result<()> {
        verify_state!("add after finish", !self.finished);
        verify_state!("write past end of stream", self.count < self.num_values);
        if value < self.previous {
            return Err(Error::invalid_arg(
                "value",
                format!(
                    "values do not come in order: {}, {}",
                    self.previous, value
                ),
            ));
        }
        if self.buffer_size == self.buffer.len() {
            self.flush()?;
        }
        self.buffer[self.buffer_size] = value;
        self.buffer_size += 1;
        self.previous = value;
        self.count += 1;
        Ok(())
    }

    /// Flushes the last block. Fails unless exactly `num_values` values were added.
    pub fn finish(&mut self) -> Result<()> {
        verify_state!("finish called twice", !self.finished);
        if self.count != self.num_values {
            return Err(Error::invalid_operation(format!(
                "Wrong number of values added, expected: {}, got: {}",
                self.num_values, self.count
            )));
        }
        if self.buffer_size > 0 {
            self.flush()?;
        }
        self.meta.flush()?;
        self.data.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> (M, D) {
        (self.meta, self.data)
    }

    fn flush(&mut self) -> Result<()> {
        let n = self.buffer_size;
        debug_assert!(n > 0);
        let values = &mut self.buffer[..n];

        // the sequence is non-decreasing, so the span fits in u64
        let span = values[n - 1].wrapping_sub(values[0]) as u64;
        let avg = slope(span as f32, n);
        for (i, v) in values.iter_mut().enumerate() {
            *v = v.wrapping_sub(expected(0, avg, i as u64));
        }
        let min = values.iter().copied().min().unwrap_or_default();
        let mut max_delta = 0u64;
        for v in values.iter_mut() {
            *v = v.wrapping_sub(min);
            max_delta |= *v as u64;
        }

        self.meta.write_long(min)?;
        self.meta.write_float_bits(avg)?;
        self.meta
            .write_long((self.data.file_pointer() - self.base_data_pointer) as i64)?;
        if max_delta == 0 {
            self.meta.write_byte(0)?;
        } else {
            let bits = direct::unsigned_bits_required(max_delta);
            let mut writer = DirectWriter::new(&mut self.data, n as u64, bits)?;
            for &v in values.iter() {
                writer.add(v)?;
            }
            writer.finish()?;
            self.meta.write_byte(bits as u8)?;
        }
        log::trace!("flushed direct monotonic block of {n} values (min {min}, avg {avg})");
        self.buffer_size = 0;
        Ok(())
    }
}

/// Per-block records loaded from a meta stream.
#[derive(Debug, Clone)]
pub struct DirectMonotonicMeta {
    num_values: u64,
    block_shift: u32,
    mins: Vec<i64>,
    avgs: Vec<f32>,
    offsets: Vec<u64>,
    bits_per_value: Vec<u8>,
}

impl DirectMonotonicMeta {
    /// Reads the records of a sequence of `num_values` values written with
    /// `block_shift`.
    pub fn load<R: Read + ?Sized>(
        meta_in: &mut R,
        num_values: u64,
        block_shift: u32,
    ) -> Result<DirectMonotonicMeta> {
        verify_arg!(
            block_shift,
            (MIN_BLOCK_SHIFT..=MAX_BLOCK_SHIFT).contains(&block_shift)
        );
        let num_blocks = usize::try_from(num_blocks(num_values, block_shift))
            .map_err(|_| Error::invalid_arg("num_values", "too many blocks"))?;
        let mut meta = DirectMonotonicMeta {
            num_values,
            block_shift,
            mins: Vec::with_capacity(num_blocks),
            avgs: Vec::with_capacity(num_blocks),
            offsets: Vec::with_capacity(num_blocks),
            bits_per_value: Vec::with_capacity(num_blocks),
        };
        for i in 0..num_blocks {
            meta.mins.push(meta_in.read_long()?);
            meta.avgs.push(meta_in.read_float_bits()?);
            let offset = meta_in.read_long()?;
            let bits = meta_in.read_byte()?;
            if offset < 0
                || (bits != 0 && !SUPPORTED_BITS_PER_VALUE.contains(&(bits as u32)))
            {
                log::debug!("corrupted direct monotonic block {i}: offset {offset}, bits {bits}");
                return Err(Error::invalid_format(
                    "direct monotonic meta",
                    format!("Corrupted block {i}: offset {offset}, bits per value {bits}"),
                ));
            }
            meta.offsets.push(offset as u64);
            meta.bits_per_value.push(bits);
        }
        Ok(meta)
    }

    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    pub fn block_shift(&self) -> u32 {
        self.block_shift
    }

    pub fn num_blocks(&self) -> usize {
        self.mins.len()
    }
}

/// Random-access reader over the data written by [`DirectMonotonicWriter`].
#[derive(Debug, Clone)]
pub struct DirectMonotonicReader {
    meta: DirectMonotonicMeta,
    block_mask: u64,
    // `None` for blocks without residuals
    readers: Vec<Option<DirectReader>>,
}

impl DirectMonotonicReader {
    pub fn new(meta: &DirectMonotonicMeta, data: &ByteSlice) -> Result<DirectMonotonicReader> {
        let readers = meta
            .bits_per_value
            .iter()
            .zip(&meta.offsets)
            .map(|(&bits, &offset)| match bits {
                0 => Ok(None),
                bits => DirectReader::new(data, bits as u32, offset).map(Some),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DirectMonotonicReader {
            meta: meta.clone(),
            block_mask: (1u64 << meta.block_shift) - 1,
            readers,
        })
    }

    pub fn size(&self) -> u64 {
        self.meta.num_values
    }

    #[inline]
    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.meta.num_values);
        let block = (index >> self.meta.block_shift) as usize;
        let block_index = index & self.block_mask;
        let delta = self.readers[block]
            .as_ref()
            .map_or(0, |reader| reader.get(block_index));
        expected(self.meta.mins[block], self.meta.avgs[block], block_index).wrapping_add(delta)
    }

    /// Returns `(lower, upper)` such that `lower <= get(index) <= upper`, computed from
    /// the meta records alone.
    pub fn bounds(&self, index: u64) -> (i64, i64) {
        let block = (index >> self.meta.block_shift) as usize;
        let block_index = index & self.block_mask;
        let bits = self.meta.bits_per_value[block] as u32;
        let lower = expected(self.meta.mins[block], self.meta.avgs[block], block_index);
        let upper = lower.wrapping_add(stowage_bits::max_value(bits) as i64);
        if bits == 64 || upper < lower {
            (i64::MIN, i64::MAX)
        } else {
            (lower, upper)
        }
    }

    /// Searches `key` in the index range `from..to`.
    ///
    /// Returns the index of a value equal to `key`, or `-(insertion_point) - 1` if
    /// there is none.
    pub fn binary_search(&self, from: u64, to: u64, key: i64) -> Result<i64> {
        verify_arg!(from, from <= to);
        verify_arg!(to, to <= self.meta.num_values);
        let mut lo = from as i64;
        let mut hi = to as i64 - 1;
        while lo <= hi {
            let mid = ((lo + hi) as u64 >> 1) as i64;
            let (lower, upper) = self.bounds(mid as u64);
            if upper < key {
                lo = mid + 1;
            } else if lower > key {
                hi = mid - 1;
            } else {
                let value = self.get(mid as u64);
                match value.cmp(&key) {
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid - 1,
                    std::cmp::Ordering::Equal => return Ok(mid),
                }
            }
        }
        Ok(-1 - lo)
    }
}

impl LongValues for DirectMonotonicReader {
    fn get(&self, index: u64) -> i64 {
        DirectMonotonicReader::get(self, index)
    }
}
