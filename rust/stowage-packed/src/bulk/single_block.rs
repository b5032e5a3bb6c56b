use stowage_bits::max_value;

use crate::format::Format;

/// Codec for the [`PackedSingleBlock`](Format::PackedSingleBlock) layout: one 64-bit
/// block per `64 / bits_per_value` values, least significant value first, with blocks
/// serialized big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOperationPackedSingleBlock {
    bits_per_value: u32,
    value_count: usize,
    mask: u64,
}

impl BulkOperationPackedSingleBlock {
    pub fn new(bits_per_value: u32) -> Option<BulkOperationPackedSingleBlock> {
        if !Format::PackedSingleBlock.is_supported(bits_per_value) {
            return None;
        }
        Some(BulkOperationPackedSingleBlock {
            bits_per_value,
            value_count: (64 / bits_per_value) as usize,
            mask: max_value(bits_per_value),
        })
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    pub fn long_block_count(&self) -> usize {
        1
    }

    pub fn long_value_count(&self) -> usize {
        self.value_count
    }

    pub fn byte_block_count(&self) -> usize {
        8
    }

    pub fn byte_value_count(&self) -> usize {
        self.value_count
    }

    #[inline]
    fn decode_block(&self, mut block: u64, out: &mut [u64]) {
        for v in out {
            *v = block & self.mask;
            block >>= self.bits_per_value;
        }
    }

    #[inline]
    fn encode_block(&self, values: &[u64]) -> u64 {
        values
            .iter()
            .enumerate()
            .fold(0, |block, (i, &v)| {
                block | ((v & self.mask) << (i as u32 * self.bits_per_value))
            })
    }

    pub fn decode_u64(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        for (&block, out) in blocks[..iterations]
            .iter()
            .zip(values.chunks_exact_mut(self.value_count))
        {
            self.decode_block(block, out);
        }
    }

    pub fn decode_bytes(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        for (bytes, out) in blocks[..8 * iterations]
            .chunks_exact(8)
            .zip(values.chunks_exact_mut(self.value_count))
        {
            let block = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
            self.decode_block(block, out);
        }
    }

    pub fn encode_u64(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        for (block, chunk) in blocks[..iterations]
            .iter_mut()
            .zip(values.chunks_exact(self.value_count))
        {
            *block = self.encode_block(chunk);
        }
    }

    pub fn encode_bytes(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        for (bytes, chunk) in blocks[..8 * iterations]
            .chunks_exact_mut(8)
            .zip(values.chunks_exact(self.value_count))
        {
            bytes.copy_from_slice(&self.encode_block(chunk).to_be_bytes());
        }
    }
}
