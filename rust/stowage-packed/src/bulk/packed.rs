use stowage_bits::max_value;

/// Runtime-width codec for the [`Packed`](crate::Format::Packed) layout.
///
/// Walks the value stream with a running bit offset, carrying the bits of a value that
/// straddles two blocks into the next block. Serves as the reference implementation
/// the width-specialized kernels are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOperationPacked {
    bits_per_value: u32,
    long_block_count: usize,
    long_value_count: usize,
    byte_block_count: usize,
    byte_value_count: usize,
    mask: u64,
}

impl BulkOperationPacked {
    pub fn new(bits_per_value: u32) -> BulkOperationPacked {
        assert!((1..=64).contains(&bits_per_value));
        let (long_block_count, long_value_count, byte_block_count, byte_value_count) =
            packed_shape(bits_per_value);
        BulkOperationPacked {
            bits_per_value,
            long_block_count,
            long_value_count,
            byte_block_count,
            byte_value_count,
            mask: max_value(bits_per_value),
        }
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
        let bpv = self.bits_per_value as i32;
        let mut bits_left = 64i32;
        let mut block = 0;
        for v in values[..self.long_value_count * iterations].iter_mut() {
            bits_left -= bpv;
            if bits_left >= 0 {
                *v = (blocks[block] >> bits_left) & self.mask;
                if bits_left == 0 {
                    block += 1;
                    bits_left = 64;
                }
            } else {
                let high = max_value((bpv + bits_left) as u32);
                *v = ((blocks[block] & high) << -bits_left)
                    | (blocks[block + 1] >> (64 + bits_left));
                block += 1;
                bits_left += 64;
            }
        }
    }

    pub fn decode_bytes(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        let bpv = self.bits_per_value;
        let mut next_value = 0u64;
        let mut bits_left = bpv;
        let mut out = 0;
        for &byte in &blocks[..self.byte_block_count * iterations] {
            let byte = byte as u64;
            if bits_left > 8 {
                bits_left -= 8;
                next_value |= byte << bits_left;
            } else {
                let mut bits = 8 - bits_left;
                values[out] = next_value | (byte >> bits);
                out += 1;
                while bits >= bpv {
                    bits -= bpv;
                    values[out] = (byte >> bits) & self.mask;
                    out += 1;
                }
                bits_left = bpv - bits;
                next_value = if bits == 0 {
                    0
                } else {
                    (byte & max_value(bits)) << bits_left
                };
            }
        }
        debug_assert_eq!(bits_left, bpv);
    }

    pub fn encode_u64(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        let bpv = self.bits_per_value as i32;
        let mut next_block = 0u64;
        let mut bits_left = 64i32;
        let mut block = 0;
        for &v in &values[..self.long_value_count * iterations] {
            let v = v & self.mask;
            bits_left -= bpv;
            if bits_left > 0 {
                next_block |= v << bits_left;
            } else if bits_left == 0 {
                blocks[block] = next_block | v;
                block += 1;
                next_block = 0;
                bits_left = 64;
            } else {
                blocks[block] = next_block | (v >> -bits_left);
                block += 1;
                next_block = (v & max_value(-bits_left as u32)) << (64 + bits_left);
                bits_left += 64;
            }
        }
    }

    pub fn encode_bytes(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        let bpv = self.bits_per_value;
        let mut next_block = 0u64;
        let mut bits_left = 8u32;
        let mut out = 0;
        for &v in &values[..self.byte_value_count * iterations] {
            let v = v & self.mask;
            if bpv < bits_left {
                next_block |= v << (bits_left - bpv);
                bits_left -= bpv;
            } else {
                let mut bits = bpv - bits_left;
                blocks[out] = (next_block | (v >> bits)) as u8;
                out += 1;
                while bits >= 8 {
                    bits -= 8;
                    blocks[out] = (v >> bits) as u8;
                    out += 1;
                }
                bits_left = 8 - bits;
                next_block = (v & max_value(bits)) << bits_left;
            }
        }
        debug_assert_eq!(bits_left, 8);
    }
}

/// Smallest block/value ratios of the packed layout at `bits_per_value`:
/// `(long_blocks, long_values, byte_blocks, byte_values)`.
pub(crate) const fn packed_shape(bits_per_value: u32) -> (usize, usize, usize, usize) {
    let bits = bits_per_value as usize;
    let long_blocks = bits >> bits.trailing_zeros();
    let long_values = 64 * long_blocks / bits;
    let mut byte_blocks = 8 * long_blocks;
    let mut byte_values = long_values;
    while byte_blocks % 2 == 0 && byte_values % 2 == 0 {
        byte_blocks >>= 1;
        byte_values >>= 1;
    }
    (long_blocks, long_values, byte_blocks, byte_values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(packed_shape(1), (1, 64, 1, 8));
        assert_eq!(packed_shape(3), (3, 64, 3, 8));
        assert_eq!(packed_shape(10), (5, 32, 5, 4));
        assert_eq!(packed_shape(20), (5, 16, 5, 2));
        assert_eq!(packed_shape(24), (3, 8, 3, 1));
        assert_eq!(packed_shape(64), (1, 1, 8, 1));
        for bits in 1..=64 {
            let (lb, lv, bb, bv) = packed_shape(bits);
            assert_eq!(lb * 64, lv * bits as usize);
            assert_eq!(bb * 8, bv * bits as usize);
        }
    }

    #[test]
    fn test_msb_first_layout() {
        let op = BulkOperationPacked::new(4);
        let values: Vec<u64> = (0..16).collect();
        let mut blocks = [0u64; 1];
        op.encode_u64(&values, &mut blocks, 1);
        assert_eq!(blocks[0], 0x0123_4567_89AB_CDEF);

        let mut bytes = [0u8; 8];
        op.encode_bytes(&values, &mut bytes, 8);
        assert_eq!(bytes, [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_straddling_values() {
        let op = BulkOperationPacked::new(10);
        fastrand::seed(3);
        let values: Vec<u64> = (0..64).map(|_| fastrand::u64(..1024)).collect();

        let mut blocks = vec![0u64; 10];
        op.encode_u64(&values, &mut blocks, 2);
        let mut decoded = vec![0u64; 64];
        op.decode_u64(&blocks, &mut decoded, 2);
        assert_eq!(decoded, values);

        let mut bytes = vec![0u8; 80];
        op.encode_bytes(&values, &mut bytes, 16);
        let expected: Vec<u8> = blocks.iter().flat_map(|b| b.to_be_bytes()).collect();
        assert_eq!(bytes, expected);
        let mut decoded = vec![0u64; 64];
        op.decode_bytes(&bytes, &mut decoded, 16);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_full_width() {
        let op = BulkOperationPacked::new(64);
        let values = [u64::MAX, 0, 0x8000_0000_0000_0001];
        let mut blocks = [0u64; 3];
        op.encode_u64(&values, &mut blocks, 3);
        assert_eq!(blocks, values);
        let mut decoded = [0u64; 3];
        op.decode_u64(&blocks, &mut decoded, 3);
        assert_eq!(decoded, values);

        let mut bytes = [0u8; 24];
        op.encode_bytes(&values, &mut bytes, 3);
        let mut decoded = [0u64; 3];
        op.decode_bytes(&bytes, &mut decoded, 3);
        assert_eq!(decoded, values);
    }
}
