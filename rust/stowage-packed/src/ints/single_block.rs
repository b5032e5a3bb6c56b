use std::io::{Read, Write};

use byteorder::{BE, ByteOrder};
use stowage_bits::max_value;
use stowage_common::Result;

use super::{PackedMutable, PackedReader, read_bytes};
use crate::bulk::BulkOperationPackedSingleBlock;
use crate::format::Format;

#[inline]
fn get_fixed<const BITS: u32>(blocks: &[u64], index: usize) -> u64 {
    let values_per_block = (64 / BITS) as usize;
    let shift = (index % values_per_block) as u32 * BITS;
    (blocks[index / values_per_block] >> shift) & max_value(BITS)
}

#[inline]
fn set_fixed<const BITS: u32>(blocks: &mut [u64], index: usize, value: u64) {
    let values_per_block = (64 / BITS) as usize;
    let shift = (index % values_per_block) as u32 * BITS;
    let mask = max_value(BITS) << shift;
    let block = &mut blocks[index / values_per_block];
    *block = (*block & !mask) | ((value << shift) & mask);
}

#[derive(Clone, Copy)]
struct WidthOps {
    get: fn(&[u64], usize) -> u64,
    set: fn(&mut [u64], usize, u64),
}

macro_rules! width_ops {
    ($bits:expr; $($width:literal),*) => {
        match $bits {
            $($width => WidthOps {
                get: get_fixed::<$width>,
                set: set_fixed::<$width>,
            },)*
            bits => panic!("unsupported single-block width {bits}"),
        }
    };
}

/// Array of values stored `64 / bits_per_value` per 64-bit word, least significant
/// first. No value straddles two words.
#[derive(Clone)]
pub struct Packed64SingleBlock {
    blocks: Vec<u64>,
    value_count: usize,
    bits_per_value: u32,
    ops: WidthOps,
    op: BulkOperationPackedSingleBlock,
}

impl Packed64SingleBlock {
    pub fn is_supported(bits_per_value: u32) -> bool {
        Format::PackedSingleBlock.is_supported(bits_per_value)
    }

    /// # Panics
    ///
    /// If `bits_per_value` is not a supported single-block width.
    pub fn new(value_count: usize, bits_per_value: u32) -> Packed64SingleBlock {
        let ops = width_ops!(bits_per_value; 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 16, 21, 32);
        let Some(op) = BulkOperationPackedSingleBlock::new(bits_per_value) else {
            panic!("unsupported single-block width {bits_per_value}");
        };
        Packed64SingleBlock {
            blocks: vec![0; Format::PackedSingleBlock.long_count(value_count, bits_per_value)],
            value_count,
            bits_per_value,
            ops,
            op,
        }
    }

    pub(crate) fn load<R: Read + ?Sized>(
        input: &mut R,
        value_count: usize,
        bits_per_value: u32,
    ) -> Result<Packed64SingleBlock> {
        let long_count = Format::PackedSingleBlock.long_count(value_count, bits_per_value);
        let bytes = read_bytes(input, long_count * 8)?;
        let mut array = Packed64SingleBlock::new(value_count, bits_per_value);
        BE::read_u64_into(&bytes, &mut array.blocks);
        Ok(array)
    }

    fn values_per_block(&self) -> usize {
        (64 / self.bits_per_value) as usize
    }
}

impl std::fmt::Debug for Packed64SingleBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packed64SingleBlock")
            .field("value_count", &self.value_count)
            .field("bits_per_value", &self.bits_per_value)
            .finish_non_exhaustive()
    }
}

impl PackedReader for Packed64SingleBlock {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.value_count);
        (self.ops.get)(&self.blocks, index)
    }

    fn size(&self) -> usize {
        self.value_count
    }

    fn bulk_get(&self, mut index: usize, arr: &mut [u64]) -> usize {
        debug_assert!(index < self.value_count);
        let original_index = index;
        let mut len = arr.len().min(self.value_count - index);
        let mut off = 0;

        let values_per_block = self.values_per_block();
        let offset_in_block = index % values_per_block;
        if offset_in_block != 0 {
            for _ in offset_in_block..values_per_block {
                if len == 0 {
                    break;
                }
                arr[off] = self.get(index);
                off += 1;
                index += 1;
                len -= 1;
            }
            if len == 0 {
                return index - original_index;
            }
        }

        let block_index = index / values_per_block;
        let block_count = (index + len) / values_per_block - block_index;
        self.op
            .decode_u64(&self.blocks[block_index..], &mut arr[off..], block_count);
        index += block_count * values_per_block;

        if index > original_index {
            index - original_index
        } else {
            for (i, v) in arr[..len].iter_mut().enumerate() {
                *v = self.get(index + i);
            }
            len
        }
    }
}

impl PackedMutable for Packed64SingleBlock {
    fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.value_count);
        (self.ops.set)(&mut self.blocks, index, value);
    }

    fn bulk_set(&mut self, mut index: usize, arr: &[u64]) -> usize {
        debug_assert!(index < self.value_count);
        let original_index = index;
        let mut len = arr.len().min(self.value_count - index);
        let mut off = 0;

        let values_per_block = self.values_per_block();
        let offset_in_block = index % values_per_block;
        if offset_in_block != 0 {
            for _ in offset_in_block..values_per_block {
                if len == 0 {
                    break;
                }
                self.set(index, arr[off]);
                off += 1;
                index += 1;
                len -= 1;
            }
            if len == 0 {
                return index - original_index;
            }
        }

        let block_index = index / values_per_block;
        let block_count = (index + len) / values_per_block - block_index;
        self.op
            .encode_u64(&arr[off..], &mut self.blocks[block_index..], block_count);
        index += block_count * values_per_block;

        if index > original_index {
            index - original_index
        } else {
            for (i, &v) in arr[..len].iter().enumerate() {
                self.set(index + i, v);
            }
            len
        }
    }

    fn fill(&mut self, mut from: usize, to: usize, value: u64) {
        debug_assert!(from <= to && to <= self.value_count);
        let values_per_block = self.values_per_block();
        if to - from <= values_per_block << 1 {
            for i in from..to {
                self.set(i, value);
            }
            return;
        }

        let offset_in_block = from % values_per_block;
        if offset_in_block != 0 {
            for _ in offset_in_block..values_per_block {
                self.set(from, value);
                from += 1;
            }
        }

        let value = value & max_value(self.bits_per_value);
        let block_value = (0..values_per_block)
            .fold(0u64, |block, i| block | (value << (i as u32 * self.bits_per_value)));
        let to_block = to / values_per_block;
        self.blocks[from / values_per_block..to_block].fill(block_value);

        for i in values_per_block * to_block..to {
            self.set(i, value);
        }
    }

    fn clear(&mut self) {
        self.blocks.fill(0);
    }

    fn format(&self) -> Format {
        Format::PackedSingleBlock
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        let mut bytes = vec![0u8; self.blocks.len() * 8];
        BE::write_u64_into(&self.blocks, &mut bytes);
        out.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_within_word() {
        let mut array = Packed64SingleBlock::new(5, 21);
        array.set(0, 1);
        array.set(1, 2);
        array.set(2, max_value(21));
        array.set(3, 7);
        let mut out = Vec::new();
        array.save(&mut out).unwrap();
        assert_eq!(out.len(), 16);
        let first = u64::from_be_bytes(out[..8].try_into().unwrap());
        assert_eq!(first, 1 | (2 << 21) | (max_value(21) << 42));
        assert_eq!(array.get(3), 7);
        assert_eq!(array.get(4), 0);
    }

    #[test]
    fn test_fill_spanning_blocks() {
        for bits in [1, 3, 7, 12, 21, 32] {
            let mut array = Packed64SingleBlock::new(300, bits);
            array.fill(0, 300, 1);
            array.fill(5, 290, max_value(bits));
            for i in 0..300 {
                let expected = if (5..290).contains(&i) { max_value(bits) } else { 1 };
                assert_eq!(array.get(i), expected, "bits {bits} index {i}");
            }
        }
    }

    #[test]
    #[should_panic]
    fn test_unsupported_width() {
        Packed64SingleBlock::new(10, 11);
    }
}
