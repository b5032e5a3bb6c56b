//! Fixed-size in-memory arrays of packed unsigned integers.
//!
//! All arrays share the [`PackedReader`] / [`PackedMutable`] contract and differ only
//! in their physical layout. [`MutableArray`] is the owned sum of all of them, as
//! produced by the factories in this module.

use std::io::{Read, Write};

use stowage_common::{Result, error::Error, verify_arg, verify_data};
use stowage_io::{DataInput, DataOutput, codec};

use crate::format::{Format, FormatAndBits, THREE_BLOCKS_MAX_SIZE};

mod direct;
mod null;
mod packed64;
mod single_block;
mod stream;
mod three_blocks;

pub use direct::{Direct, Direct8, Direct16, Direct32, Direct64, DirectWord};
pub use null::NullMutable;
pub use packed64::Packed64;
pub use single_block::Packed64SingleBlock;
pub use stream::{PackedReaderIterator, PackedWriter, get_writer};
pub use three_blocks::{Packed8ThreeBlocks, Packed16ThreeBlocks};

/// Codec name of self-describing packed arrays.
pub const CODEC_NAME: &str = "PackedInts";
pub const VERSION_START: i32 = 2;
pub const VERSION_CURRENT: i32 = VERSION_START;

/// Read access to a fixed-size array of unsigned integers.
///
/// Index arguments follow slice semantics: out-of-range indices panic.
pub trait PackedReader {
    fn get(&self, index: usize) -> u64;

    fn size(&self) -> usize;

    /// Reads up to `arr.len()` values starting at `index` into `arr`, returning how many
    /// were read. At least one value is read when `arr` is not empty and `index` is
    /// in range.
    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        debug_assert!(index < self.size());
        let len = arr.len().min(self.size() - index);
        for (i, v) in arr[..len].iter_mut().enumerate() {
            *v = self.get(index + i);
        }
        len
    }
}

/// Read/write access to a fixed-size array of unsigned integers of a fixed width.
///
/// Values must fit in [`bits_per_value`](PackedMutable::bits_per_value) bits.
pub trait PackedMutable: PackedReader {
    fn bits_per_value(&self) -> u32;

    fn set(&mut self, index: usize, value: u64);

    /// Writes up to `arr.len()` values starting at `index`, returning how many were
    /// written. At least one value is written when `arr` is not empty and `index` is
    /// in range.
    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        debug_assert!(index < self.size());
        let len = arr.len().min(self.size() - index);
        for (i, &v) in arr[..len].iter().enumerate() {
            self.set(index + i, v);
        }
        len
    }

    /// Sets all values in `from..to` to `value`.
    fn fill(&mut self, from: usize, to: usize, value: u64) {
        debug_assert!(from <= to && to <= self.size());
        for i in from..to {
            self.set(i, value);
        }
    }

    /// Resets all values to zero.
    fn clear(&mut self) {
        let size = self.size();
        self.fill(0, size, 0);
    }

    fn format(&self) -> Format {
        Format::Packed
    }

    /// Writes the array in its serialized layout: `format().byte_count(size(),
    /// bits_per_value())` bytes, readable with [`get_reader_no_header`].
    fn save(&self, out: &mut dyn Write) -> Result<()>;
}

/// Any of the fixed-size array layouts.
#[derive(Debug, Clone)]
pub enum MutableArray {
    Direct8(Direct8),
    Direct16(Direct16),
    Direct32(Direct32),
    Direct64(Direct64),
    Packed8ThreeBlocks(Packed8ThreeBlocks),
    Packed16ThreeBlocks(Packed16ThreeBlocks),
    Packed64(Packed64),
    Packed64SingleBlock(Packed64SingleBlock),
    Null(NullMutable),
}

macro_rules! delegate {
    ($self:ident, $array:ident => $body:expr) => {
        match $self {
            MutableArray::Direct8($array) => $body,
            MutableArray::Direct16($array) => $body,
            MutableArray::Direct32($array) => $body,
            MutableArray::Direct64($array) => $body,
            MutableArray::Packed8ThreeBlocks($array) => $body,
            MutableArray::Packed16ThreeBlocks($array) => $body,
            MutableArray::Packed64($array) => $body,
            MutableArray::Packed64SingleBlock($array) => $body,
            MutableArray::Null($array) => $body,
        }
    };
}

impl PackedReader for MutableArray {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        delegate!(self, a => a.get(index))
    }

    fn size(&self) -> usize {
        delegate!(self, a => a.size())
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        delegate!(self, a => a.bulk_get(index, arr))
    }
}

impl PackedMutable for MutableArray {
    fn bits_per_value(&self) -> u32 {
        delegate!(self, a => a.bits_per_value())
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        delegate!(self, a => a.set(index, value))
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        delegate!(self, a => a.bulk_set(index, arr))
    }

    fn fill(&mut self, from: usize, to: usize, value: u64) {
        delegate!(self, a => a.fill(from, to, value))
    }

    fn clear(&mut self) {
        delegate!(self, a => a.clear())
    }

    fn format(&self) -> Format {
        delegate!(self, a => a.format())
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        delegate!(self, a => a.save(out))
    }
}

/// Creates a zero-filled array able to store `value_count` values of `bits_per_value`
/// bits, trading memory for speed as allowed by `acceptable_overhead_ratio`.
pub fn get_mutable(
    value_count: usize,
    bits_per_value: u32,
    acceptable_overhead_ratio: f32,
) -> MutableArray {
    let layout =
        FormatAndBits::fastest(Some(value_count), bits_per_value, acceptable_overhead_ratio);
    new_mutable(value_count, layout)
}

/// Creates a zero-filled array with an explicit layout.
pub fn get_mutable_with_format(
    value_count: usize,
    bits_per_value: u32,
    format: Format,
) -> Result<MutableArray> {
    if !format.is_supported(bits_per_value) {
        return Err(Error::invalid_arg(
            "bits_per_value",
            format!("{bits_per_value} is not supported by {format:?}"),
        ));
    }
    Ok(new_mutable(
        value_count,
        FormatAndBits::new(format, bits_per_value),
    ))
}

/// Verifies that `block_size` is a power of two in `min..=max` and returns its log2.
pub fn check_block_size(block_size: usize, min: usize, max: usize) -> Result<u32> {
    if !(min..=max).contains(&block_size) {
        return Err(Error::invalid_arg(
            "block_size",
            format!("must be in [{min}, {max}], got {block_size}"),
        ));
    }
    verify_arg!(block_size, block_size.is_power_of_two());
    Ok(block_size.trailing_zeros())
}

/// Number of blocks of `block_size` values needed to hold `size` values.
pub fn num_blocks(size: u64, block_size: usize) -> Result<usize> {
    usize::try_from(size.div_ceil(block_size as u64))
        .map_err(|_| Error::invalid_arg("size", "too large for this block size"))
}

pub(crate) fn new_mutable(value_count: usize, layout: FormatAndBits) -> MutableArray {
    let FormatAndBits {
        format,
        bits_per_value,
    } = layout;
    match (format, bits_per_value) {
        (Format::PackedSingleBlock, _) => MutableArray::Packed64SingleBlock(
            Packed64SingleBlock::new(value_count, bits_per_value),
        ),
        (Format::Packed, 8) => MutableArray::Direct8(Direct8::new(value_count)),
        (Format::Packed, 16) => MutableArray::Direct16(Direct16::new(value_count)),
        (Format::Packed, 32) => MutableArray::Direct32(Direct32::new(value_count)),
        (Format::Packed, 64) => MutableArray::Direct64(Direct64::new(value_count)),
        (Format::Packed, 24) if value_count <= THREE_BLOCKS_MAX_SIZE => {
            MutableArray::Packed8ThreeBlocks(Packed8ThreeBlocks::new(value_count))
        }
        (Format::Packed, 48) if value_count <= THREE_BLOCKS_MAX_SIZE => {
            MutableArray::Packed16ThreeBlocks(Packed16ThreeBlocks::new(value_count))
        }
        (Format::Packed, _) => MutableArray::Packed64(Packed64::new(value_count, bits_per_value)),
    }
}

/// Reads an array written by [`PackedMutable::save`], given the metadata the writer
/// recorded elsewhere.
pub fn get_reader_no_header<R: Read + ?Sized>(
    input: &mut R,
    format: Format,
    version: i32,
    value_count: usize,
    bits_per_value: u32,
) -> Result<MutableArray> {
    check_version(version)?;
    verify_data!(bits_per_value, format.is_supported(bits_per_value));
    let array = match (format, bits_per_value) {
        (Format::PackedSingleBlock, _) => MutableArray::Packed64SingleBlock(
            Packed64SingleBlock::load(input, value_count, bits_per_value)?,
        ),
        (Format::Packed, 8) => MutableArray::Direct8(Direct8::load(input, value_count)?),
        (Format::Packed, 16) => MutableArray::Direct16(Direct16::load(input, value_count)?),
        (Format::Packed, 32) => MutableArray::Direct32(Direct32::load(input, value_count)?),
        (Format::Packed, 64) => MutableArray::Direct64(Direct64::load(input, value_count)?),
        (Format::Packed, 24) if value_count <= THREE_BLOCKS_MAX_SIZE => {
            MutableArray::Packed8ThreeBlocks(Packed8ThreeBlocks::load(input, value_count)?)
        }
        (Format::Packed, 48) if value_count <= THREE_BLOCKS_MAX_SIZE => {
            MutableArray::Packed16ThreeBlocks(Packed16ThreeBlocks::load(input, value_count)?)
        }
        (Format::Packed, _) => {
            MutableArray::Packed64(Packed64::load(input, value_count, bits_per_value)?)
        }
    };
    Ok(array)
}

/// Metadata stored in front of a self-describing packed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedHeader {
    pub format: Format,
    pub version: i32,
    pub value_count: usize,
    pub bits_per_value: u32,
}

impl PackedHeader {
    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<PackedHeader> {
        let version = codec::check_header(input, CODEC_NAME, VERSION_START, VERSION_CURRENT)?;
        let bits_per_value = input.read_vint()?;
        verify_data!(bits_per_value, (1..=64).contains(&bits_per_value));
        let value_count = input.read_vint()? as usize;
        let format = Format::from_id(input.read_vint()?)?;
        Ok(PackedHeader {
            format,
            version,
            value_count,
            bits_per_value,
        })
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        verify_arg!(bits_per_value, (1..=64).contains(&self.bits_per_value));
        let value_count = u32::try_from(self.value_count)
            .map_err(|_| Error::invalid_arg("value_count", "exceeds the header range"))?;
        codec::write_header(out, CODEC_NAME, VERSION_CURRENT)?;
        out.write_vint(self.bits_per_value)?;
        out.write_vint(value_count)?;
        out.write_vint(self.format.id())?;
        Ok(())
    }
}

/// Writes `array` preceded by a [`PackedHeader`], readable with [`get_reader`].
pub fn save_with_header<M, W>(array: &M, out: &mut W) -> Result<()>
where
    M: PackedMutable + ?Sized,
    W: Write,
{
    PackedHeader {
        format: array.format(),
        version: VERSION_CURRENT,
        value_count: array.size(),
        bits_per_value: array.bits_per_value(),
    }
    .write(out)?;
    array.save(out)
}

/// Reads a self-describing array written by [`save_with_header`].
pub fn get_reader<R: Read + ?Sized>(input: &mut R) -> Result<MutableArray> {
    let header = PackedHeader::read(input)?;
    get_reader_no_header(
        input,
        header.format,
        header.version,
        header.value_count,
        header.bits_per_value,
    )
}

/// Opens a sequential iterator over a self-describing array written by
/// [`save_with_header`], buffering at most about `mem` bytes.
pub fn get_reader_iterator<R: Read>(mut input: R, mem: usize) -> Result<PackedReaderIterator<R>> {
    let header = PackedHeader::read(&mut input)?;
    PackedReaderIterator::new(
        header.format,
        header.value_count,
        header.bits_per_value,
        input,
        mem,
    )
}

/// Copies `len` values from `src[src_pos..]` to `dest[dest_pos..]` through a buffer of
/// at most `mem` bytes. A zero-sized budget copies value by value.
pub fn copy<S, D>(src: &S, src_pos: usize, dest: &mut D, dest_pos: usize, len: usize, mem: usize)
where
    S: PackedReader + ?Sized,
    D: PackedMutable + ?Sized,
{
    debug_assert!(src_pos + len <= src.size());
    debug_assert!(dest_pos + len <= dest.size());
    let capacity = mem >> 3;
    if capacity == 0 {
        for i in 0..len {
            dest.set(dest_pos + i, src.get(src_pos + i));
        }
    } else if len > 0 {
        let mut buf = vec![0u64; capacity.min(len)];
        copy_with_buffer(src, src_pos, dest, dest_pos, len, &mut buf);
    }
}

fn copy_with_buffer<S, D>(
    src: &S,
    mut src_pos: usize,
    dest: &mut D,
    mut dest_pos: usize,
    mut len: usize,
    buf: &mut [u64],
) where
    S: PackedReader + ?Sized,
    D: PackedMutable + ?Sized,
{
    let mut remaining = 0;
    while len > 0 {
        let end = remaining + len.min(buf.len() - remaining);
        let read = src.bulk_get(src_pos, &mut buf[remaining..end]);
        src_pos += read;
        len -= read;
        remaining += read;
        let written = dest.bulk_set(dest_pos, &buf[..remaining]);
        dest_pos += written;
        buf.copy_within(written..remaining, 0);
        remaining -= written;
    }
    while remaining > 0 {
        let written = dest.bulk_set(dest_pos, &buf[..remaining]);
        dest_pos += written;
        buf.copy_within(written..remaining, 0);
        remaining -= written;
    }
}

fn check_version(version: i32) -> Result<()> {
    verify_data!(
        version,
        (VERSION_START..=VERSION_CURRENT).contains(&version)
    );
    Ok(())
}

/// Reads exactly `len` bytes. The buffer grows with the data actually read, so a
/// corrupted length fails at the end of the input instead of allocating `len` up front.
pub(crate) fn read_bytes<R: Read + ?Sized>(input: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    (&mut *input).take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < len {
        return Err(Error::io(
            "packed array",
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {len} bytes, found {}", bytes.len()),
            ),
        ));
    }
    Ok(bytes)
}
