//! Sequential writer and reader of the packed layouts, without random access.

use std::io::{Read, Write};

use stowage_common::{Result, error::Error, verify_state};
use stowage_io::DataInput;

use super::PackedHeader;
use crate::bulk::{BulkOperation, bulk_operation};
use crate::format::{DEFAULT_BUFFER_SIZE, Format, FormatAndBits};

/// Streams a known number of values in a packed layout, encoding them in buffered
/// batches. The output is byte-identical to [`PackedMutable::save`] of an array holding
/// the same values.
///
/// [`PackedMutable::save`]: super::PackedMutable::save
pub struct PackedWriter<W: Write> {
    out: W,
    format: Format,
    value_count: usize,
    bits_per_value: u32,
    op: &'static BulkOperation,
    iterations: usize,
    next_blocks: Vec<u8>,
    next_values: Vec<u64>,
    off: usize,
    written: usize,
    finished: bool,
}

impl<W: Write> PackedWriter<W> {
    /// Creates a writer of `value_count` values whose buffers take about `mem` bytes.
    pub fn new(
        format: Format,
        out: W,
        value_count: usize,
        bits_per_value: u32,
        mem: usize,
    ) -> Result<PackedWriter<W>> {
        let op = bulk_operation(format, bits_per_value)?;
        let iterations = op.compute_iterations(value_count, mem);
        Ok(PackedWriter {
            out,
            format,
            value_count,
            bits_per_value,
            op,
            iterations,
            next_blocks: vec![0; iterations * op.byte_block_count()],
            next_values: vec![0; iterations * op.byte_value_count()],
            off: 0,
            written: 0,
            finished: false,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Number of values added so far.
    pub fn ord(&self) -> usize {
        self.written
    }

    pub fn add(&mut self, value: u64) -> Result<()> {
        verify_state!("add after finish", !self.finished);
        verify_state!("write past end of stream", self.written < self.value_count);
        self.next_values[self.off] = value;
        self.off += 1;
        if self.off == self.next_values.len() {
            self.flush()?;
        }
        self.written += 1;
        Ok(())
    }

    /// Pads the stream with zeros up to the value count and flushes everything.
    pub fn finish(&mut self) -> Result<()> {
        verify_state!("finish called twice", !self.finished);
        while self.written < self.value_count {
            self.add(0)?;
        }
        self.flush()?;
        self.out.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(&mut self) -> Result<()> {
        if self.off == 0 {
            return Ok(());
        }
        self.op
            .encode_bytes(&self.next_values, &mut self.next_blocks, self.iterations);
        let byte_count = self.format.byte_count(self.off, self.bits_per_value);
        self.out.write_all(&self.next_blocks[..byte_count])?;
        self.next_values.fill(0);
        self.off = 0;
        Ok(())
    }
}

/// Writes a [`PackedHeader`] for the fastest layout affordable under
/// `acceptable_overhead_ratio` and returns a writer for the values.
pub fn get_writer<W: Write>(
    mut out: W,
    value_count: usize,
    bits_per_value: u32,
    acceptable_overhead_ratio: f32,
) -> Result<PackedWriter<W>> {
    let layout =
        FormatAndBits::fastest(Some(value_count), bits_per_value, acceptable_overhead_ratio);
    PackedHeader {
        format: layout.format,
        version: super::VERSION_CURRENT,
        value_count,
        bits_per_value: layout.bits_per_value,
    }
    .write(&mut out)?;
    PackedWriter::new(
        layout.format,
        out,
        value_count,
        layout.bits_per_value,
        DEFAULT_BUFFER_SIZE,
    )
}

/// Sequential reader of values written by [`PackedWriter`] or
/// [`PackedMutable::save`](super::PackedMutable::save).
pub struct PackedReaderIterator<R: Read> {
    input: R,
    format: Format,
    value_count: usize,
    bits_per_value: u32,
    op: &'static BulkOperation,
    iterations: usize,
    next_blocks: Vec<u8>,
    next_values: Vec<u64>,
    /// Start of the slice last returned by `next_slice`.
    offset: usize,
    /// Length of the slice last returned by `next_slice`.
    length: usize,
    position: usize,
}

impl<R: Read> PackedReaderIterator<R> {
    pub fn new(
        format: Format,
        value_count: usize,
        bits_per_value: u32,
        input: R,
        mem: usize,
    ) -> Result<PackedReaderIterator<R>> {
        let op = bulk_operation(format, bits_per_value)?;
        let iterations = op.compute_iterations(value_count, mem);
        let next_values = vec![0; iterations * op.byte_value_count()];
        Ok(PackedReaderIterator {
            input,
            format,
            value_count,
            bits_per_value,
            op,
            iterations,
            next_blocks: vec![0; iterations * op.byte_block_count()],
            offset: next_values.len(),
            length: 0,
            next_values,
            position: 0,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn size(&self) -> usize {
        self.value_count
    }

    /// Number of values consumed so far.
    pub fn ord(&self) -> usize {
        self.position
    }

    /// Returns the next value, or an end-of-stream error once all values were read.
    pub fn next_value(&mut self) -> Result<u64> {
        let values = self.next_slice(1)?;
        Ok(values[0])
    }

    /// Returns between 1 and `count` of the next values, fewer when the buffer or the
    /// stream runs out.
    pub fn next_slice(&mut self, count: usize) -> Result<&[u64]> {
        debug_assert!(count > 0);
        self.offset += self.length;
        self.length = 0;

        let remaining = self.value_count - self.position;
        if remaining == 0 {
            return Err(Error::io(
                "packed reader iterator",
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "read past end"),
            ));
        }
        let count = count.clamp(1, remaining);

        if self.offset == self.next_values.len() {
            self.refill(remaining)?;
        }

        self.length = (self.next_values.len() - self.offset).min(count);
        self.position += self.length;
        Ok(&self.next_values[self.offset..self.offset + self.length])
    }

    fn refill(&mut self, remaining: usize) -> Result<()> {
        let remaining_bytes = self.format.byte_count(remaining, self.bits_per_value);
        let to_read = remaining_bytes.min(self.next_blocks.len());
        self.input.read_bytes(&mut self.next_blocks[..to_read])?;
        self.next_blocks[to_read..].fill(0);
        self.op
            .decode_bytes(&self.next_blocks, &mut self.next_values, self.iterations);
        self.offset = 0;
        Ok(())
    }
}

impl<R: Read> Iterator for PackedReaderIterator<R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Result<u64>> {
        if self.position >= self.value_count {
            return None;
        }
        Some(self.next_value())
    }
}
