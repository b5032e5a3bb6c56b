use std::io::{Read, Write};

use stowage_bits::{gcd, max_value};
use stowage_common::Result;

use super::{PackedMutable, PackedReader, read_bytes};
use crate::bulk::{BulkOperation, packed_operation};
use crate::format::Format;

/// Array of values packed contiguously into 64-bit words, most significant bit first.
/// A value may straddle two consecutive words.
#[derive(Debug, Clone)]
pub struct Packed64 {
    blocks: Vec<u64>,
    value_count: usize,
    bits_per_value: u32,
    mask: u64,
    op: &'static BulkOperation,
}

impl Packed64 {
    /// # Panics
    ///
    /// If `bits_per_value` is not in `1..=64`.
    pub fn new(value_count: usize, bits_per_value: u32) -> Packed64 {
        assert!(
            (1..=64).contains(&bits_per_value),
            "unsupported width {bits_per_value}"
        );
        Packed64 {
            blocks: vec![0; Format::Packed.long_count(value_count, bits_per_value)],
            value_count,
            bits_per_value,
            mask: max_value(bits_per_value),
            op: packed_operation(bits_per_value),
        }
    }

    /// Reads the `byte_count` serialized bytes; a trailing partial word is left-aligned.
    pub(crate) fn load<R: Read + ?Sized>(
        input: &mut R,
        value_count: usize,
        bits_per_value: u32,
    ) -> Result<Packed64> {
        let bytes = read_bytes(input, Format::Packed.byte_count(value_count, bits_per_value))?;
        let mut array = Packed64::new(value_count, bits_per_value);
        for (block, chunk) in array.blocks.iter_mut().zip(bytes.chunks(8)) {
            *block = chunk
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &b)| acc | ((b as u64) << (56 - 8 * i)));
        }
        Ok(array)
    }

    /// Word index of `index` and the signed distance of the value end past that word.
    #[inline]
    fn locate(&self, index: usize) -> (usize, i32) {
        let major = index as u64 * self.bits_per_value as u64;
        let element = (major >> 6) as usize;
        let end_bits = (major & 63) as i32 + self.bits_per_value as i32 - 64;
        (element, end_bits)
    }
}

impl PackedReader for Packed64 {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.value_count);
        let (element, end_bits) = self.locate(index);
        if end_bits <= 0 {
            (self.blocks[element] >> -end_bits) & self.mask
        } else {
            ((self.blocks[element] << end_bits) | (self.blocks[element + 1] >> (64 - end_bits)))
                & self.mask
        }
    }

    fn size(&self) -> usize {
        self.value_count
    }

    fn bulk_get(&self, mut index: usize, arr: &mut [u64]) -> usize {
        debug_assert!(index < self.value_count);
        let original_index = index;
        let mut len = arr.len().min(self.value_count - index);
        let mut off = 0;

        // move to the next value starting on a word boundary
        let values_per_iteration = self.op.long_value_count();
        let offset_in_blocks = index % values_per_iteration;
        if offset_in_blocks != 0 {
            for _ in offset_in_blocks..values_per_iteration {
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

        let block_index = ((index as u64 * self.bits_per_value as u64) >> 6) as usize;
        let iterations = len / values_per_iteration;
        self.op
            .decode_u64(&self.blocks[block_index..], &mut arr[off..], iterations);
        index += iterations * values_per_iteration;

        if index > original_index {
            index - original_index
        } else {
            // aligned, but not a single full iteration left
            for (i, v) in arr[..len].iter_mut().enumerate() {
                *v = self.get(index + i);
            }
            len
        }
    }
}

impl PackedMutable for Packed64 {
    fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.value_count);
        let value = value & self.mask;
        let (element, end_bits) = self.locate(index);
        if end_bits <= 0 {
            let shift = -end_bits;
            self.blocks[element] =
                (self.blocks[element] & !(self.mask << shift)) | (value << shift);
        } else {
            self.blocks[element] =
                (self.blocks[element] & !(self.mask >> end_bits)) | (value >> end_bits);
            self.blocks[element + 1] = (self.blocks[element + 1] & (u64::MAX >> end_bits))
                | (value << (64 - end_bits));
        }
    }

    fn bulk_set(&mut self, mut index: usize, arr: &[u64]) -> usize {
        debug_assert!(index < self.value_count);
        let original_index = index;
        let mut len = arr.len().min(self.value_count - index);
        let mut off = 0;

        let values_per_iteration = self.op.long_value_count();
        let offset_in_blocks = index % values_per_iteration;
        if offset_in_blocks != 0 {
            for _ in offset_in_blocks..values_per_iteration {
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

        let block_index = ((index as u64 * self.bits_per_value as u64) >> 6) as usize;
        let iterations = len / values_per_iteration;
        self.op
            .encode_u64(&arr[off..], &mut self.blocks[block_index..], iterations);
        index += iterations * values_per_iteration;

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
        let value = value & self.mask;
        let bits = self.bits_per_value as usize;

        // smallest run of values covering a whole number of words
        let aligned_values = 64 / gcd(64, bits as u64) as usize;
        if to - from <= 3 * aligned_values {
            for i in from..to {
                self.set(i, value);
            }
            return;
        }

        let head = from % aligned_values;
        if head != 0 {
            for _ in head..aligned_values {
                self.set(from, value);
                from += 1;
            }
        }
        debug_assert_eq!(from % aligned_values, 0);

        let aligned_blocks = (aligned_values * bits) >> 6;
        let mut pattern = Packed64::new(aligned_values, self.bits_per_value);
        for i in 0..aligned_values {
            pattern.set(i, value);
        }

        let start_block = (from * bits) >> 6;
        let end_block = (to * bits) >> 6;
        for (block, &word) in self.blocks[start_block..end_block]
            .iter_mut()
            .zip(pattern.blocks[..aligned_blocks].iter().cycle())
        {
            *block = word;
        }

        // the last value of the run may straddle the first word left untouched
        for i in (end_block << 6) / bits..to {
            self.set(i, value);
        }
    }

    fn clear(&mut self) {
        self.blocks.fill(0);
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        let byte_count = Format::Packed.byte_count(self.value_count, self.bits_per_value);
        let bytes: Vec<u8> = self
            .blocks
            .iter()
            .flat_map(|block| block.to_be_bytes())
            .take(byte_count)
            .collect();
        out.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straddling_get_set() {
        let mut array = Packed64::new(10, 60);
        array.set(0, max_value(60));
        array.set(1, 0x0ABC_DEF0_1234_5678);
        array.set(2, 1);
        assert_eq!(array.get(0), max_value(60));
        assert_eq!(array.get(1), 0x0ABC_DEF0_1234_5678);
        assert_eq!(array.get(2), 1);
        assert_eq!(array.get(3), 0);

        array.set(1, 0);
        assert_eq!(array.get(0), max_value(60));
        assert_eq!(array.get(2), 1);
    }

    #[test]
    fn test_fill_matches_naive() {
        fastrand::seed(21);
        for bits in [1, 3, 10, 17, 33, 63, 64] {
            let value = fastrand::u64(..) & max_value(bits);
            let mut array = Packed64::new(1000, bits);
            let mut expected = vec![0u64; 1000];
            for i in 0..1000 {
                let v = fastrand::u64(..) & max_value(bits);
                array.set(i, v);
                expected[i] = v;
            }
            let (from, to) = (37, 911);
            array.fill(from, to, value);
            expected[from..to].fill(value);
            for (i, &v) in expected.iter().enumerate() {
                assert_eq!(array.get(i), v, "bits {bits} index {i}");
            }
        }
    }

    #[test]
    fn test_bulk_from_unaligned_index() {
        fastrand::seed(4);
        let bits = 7;
        let mut array = Packed64::new(500, bits);
        let values: Vec<u64> = (0..500).map(|_| fastrand::u64(..128)).collect();
        let mut index = 3;
        while index < 500 {
            index += array.bulk_set(index, &values[index..]);
        }
        let mut buf = vec![0u64; 500];
        let mut index = 5;
        while index < 500 {
            let read = array.bulk_get(index, &mut buf[index..]);
            assert!(read > 0);
            index += read;
        }
        assert_eq!(&buf[5..], &values[5..]);
        assert_eq!(array.get(2), 0);
    }

    #[test]
    fn test_partial_last_word() {
        let mut array = Packed64::new(3, 5);
        array.set(0, 0b10101);
        array.set(2, 0b11111);
        let mut out = Vec::new();
        array.save(&mut out).unwrap();
        assert_eq!(out, [0b1010_1000, 0b0011_1110]);
        let loaded = Packed64::load(&mut out.as_slice(), 3, 5).unwrap();
        assert_eq!(loaded.get(0), 0b10101);
        assert_eq!(loaded.get(2), 0b11111);
    }
}
