//! Width-specialized kernels for the `Packed` layout.
//!
//! Every kernel is generic over a compile-time width, so block/value counts, masks and
//! per-value bit positions are constants and the inner loops unroll. The runtime width
//! is mapped onto a kernel instantiation by a `seq!`-generated match.

use seq_macro::seq;
use stowage_bits::max_value;

use super::packed::packed_shape;

/// Compile-time layout constants of one width.
pub struct Width<const BITS: u32>;

impl<const BITS: u32> Width<BITS> {
    const SHAPE: (usize, usize, usize, usize) = packed_shape(BITS);
    pub const LONG_BLOCKS: usize = Self::SHAPE.0;
    pub const LONG_VALUES: usize = Self::SHAPE.1;
    pub const BYTE_BLOCKS: usize = Self::SHAPE.2;
    pub const BYTE_VALUES: usize = Self::SHAPE.3;
    pub const MASK: u64 = max_value(BITS);
}

#[inline(always)]
fn word_value<const BITS: u32>(block: &[u64], index: usize) -> u64 {
    let bit = index * BITS as usize;
    let word = bit >> 6;
    let end = (bit & 63) + BITS as usize;
    if end <= 64 {
        (block[word] >> (64 - end)) & Width::<BITS>::MASK
    } else {
        let low_bits = end - 64;
        ((block[word] << low_bits) | (block[word + 1] >> (64 - low_bits))) & Width::<BITS>::MASK
    }
}

#[inline(always)]
fn byte_value<const BITS: u32>(block: &[u8], index: usize) -> u64 {
    let start_bit = index * BITS as usize;
    let end_bit = start_bit + BITS as usize;
    let end_byte = end_bit.div_ceil(8);
    let acc = block[start_bit >> 3..end_byte]
        .iter()
        .fold(0u128, |acc, &b| (acc << 8) | b as u128);
    ((acc >> (end_byte * 8 - end_bit)) as u64) & Width::<BITS>::MASK
}

pub fn decode_u64<const BITS: u32>(blocks: &[u64], values: &mut [u64], iterations: usize) {
    let blocks = &blocks[..iterations * Width::<BITS>::LONG_BLOCKS];
    let values = &mut values[..iterations * Width::<BITS>::LONG_VALUES];
    for (block, out) in blocks
        .chunks_exact(Width::<BITS>::LONG_BLOCKS)
        .zip(values.chunks_exact_mut(Width::<BITS>::LONG_VALUES))
    {
        for (i, v) in out.iter_mut().enumerate() {
            *v = word_value::<BITS>(block, i);
        }
    }
}

pub fn decode_bytes<const BITS: u32>(blocks: &[u8], values: &mut [u64], iterations: usize) {
    let blocks = &blocks[..iterations * Width::<BITS>::BYTE_BLOCKS];
    let values = &mut values[..iterations * Width::<BITS>::BYTE_VALUES];
    for (block, out) in blocks
        .chunks_exact(Width::<BITS>::BYTE_BLOCKS)
        .zip(values.chunks_exact_mut(Width::<BITS>::BYTE_VALUES))
    {
        for (i, v) in out.iter_mut().enumerate() {
            *v = byte_value::<BITS>(block, i);
        }
    }
}

pub fn encode_u64<const BITS: u32>(values: &[u64], blocks: &mut [u64], iterations: usize) {
    let values = &values[..iterations * Width::<BITS>::LONG_VALUES];
    let blocks = &mut blocks[..iterations * Width::<BITS>::LONG_BLOCKS];
    for (out, chunk) in blocks
        .chunks_exact_mut(Width::<BITS>::LONG_BLOCKS)
        .zip(values.chunks_exact(Width::<BITS>::LONG_VALUES))
    {
        out.fill(0);
        for (i, &v) in chunk.iter().enumerate() {
            let v = v & Width::<BITS>::MASK;
            let bit = i * BITS as usize;
            let word = bit >> 6;
            let end = (bit & 63) + BITS as usize;
            if end <= 64 {
                out[word] |= v << (64 - end);
            } else {
                let low_bits = end - 64;
                out[word] |= v >> low_bits;
                out[word + 1] |= v << (64 - low_bits);
            }
        }
    }
}

pub fn encode_bytes<const BITS: u32>(values: &[u64], blocks: &mut [u8], iterations: usize) {
    let values = &values[..iterations * Width::<BITS>::BYTE_VALUES];
    let blocks = &mut blocks[..iterations * Width::<BITS>::BYTE_BLOCKS];
    for (out, chunk) in blocks
        .chunks_exact_mut(Width::<BITS>::BYTE_BLOCKS)
        .zip(values.chunks_exact(Width::<BITS>::BYTE_VALUES))
    {
        out.fill(0);
        for (i, &v) in chunk.iter().enumerate() {
            let start_bit = i * BITS as usize;
            let end_bit = start_bit + BITS as usize;
            let end_byte = end_bit.div_ceil(8);
            let acc = ((v & Width::<BITS>::MASK) as u128) << (end_byte * 8 - end_bit);
            for (k, b) in out[start_bit >> 3..end_byte].iter_mut().rev().enumerate() {
                *b |= (acc >> (8 * k)) as u8;
            }
        }
    }
}

macro_rules! dispatch_width {
    ($bits:expr, $kernel:ident($($arg:expr),*)) => {
        seq!(W in 1..=64 {
            match $bits {
                #(W => $kernel::<W>($($arg),*),)*
                bits => unreachable!("no specialized kernel for width {bits}"),
            }
        })
    };
}

/// Runtime handle onto the specialized kernels of one width in `1..=64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedFixed {
    bits_per_value: u32,
    long_block_count: usize,
    long_value_count: usize,
    byte_block_count: usize,
    byte_value_count: usize,
}

impl PackedFixed {
    pub fn new(bits_per_value: u32) -> Option<PackedFixed> {
        if !(1..=64).contains(&bits_per_value) {
            return None;
        }
        let (long_block_count, long_value_count, byte_block_count, byte_value_count) =
            packed_shape(bits_per_value);
        Some(PackedFixed {
            bits_per_value,
            long_block_count,
            long_value_count,
            byte_block_count,
            byte_value_count,
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn long_block_count(&self) -> usize {
        self.long_block_count
    }

    pub fn long_value_count(&self) -> usize {
        self.long_value_count
    }

    pub fn byte_block_count(&self) -> usize {
        self.byte_block_count
    }

    pub fn byte_value_count(&self) -> usize {
        self.byte_value_count
    }

    pub fn decode_u64(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        dispatch_width!(self.bits_per_value, decode_u64(blocks, values, iterations))
    }

    pub fn decode_bytes(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        dispatch_width!(self.bits_per_value, decode_bytes(blocks, values, iterations))
    }

    pub fn encode_u64(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        dispatch_width!(self.bits_per_value, encode_u64(values, blocks, iterations))
    }

    pub fn encode_bytes(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        dispatch_width!(self.bits_per_value, encode_bytes(values, blocks, iterations))
    }
}
