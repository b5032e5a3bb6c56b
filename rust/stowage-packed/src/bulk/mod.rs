//! Bulk conversion between packed blocks and arrays of unpacked values.
//!
//! A [`BulkOperation`] processes whole *iterations*: the smallest run of blocks that
//! holds an exact number of values. `long_block_count` words (or `byte_block_count`
//! bytes) encode exactly `long_value_count` (or `byte_value_count`) values; every
//! `decode_*`/`encode_*` call converts `iterations` such runs.
//!
//! Operations are shared, immutable, and looked up per layout and width through
//! [`bulk_operation`].

use std::sync::LazyLock;

use stowage_common::{Result, error::Error};

use crate::format::Format;

mod packed;
mod single_block;
mod specialized;

pub use packed::BulkOperationPacked;
pub use single_block::BulkOperationPackedSingleBlock;
pub use specialized::{PackedFixed, Width};
pub use specialized::{decode_bytes, decode_u64, encode_bytes, encode_u64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    /// `Packed` codec backed by width-specialized kernels.
    Packed(PackedFixed),
    PackedSingleBlock(BulkOperationPackedSingleBlock),
}

macro_rules! delegate {
    ($self:ident, $op:ident => $body:expr) => {
        match $self {
            BulkOperation::Packed($op) => $body,
            BulkOperation::PackedSingleBlock($op) => $body,
        }
    };
}

impl BulkOperation {
    pub fn format(&self) -> Format {
        match self {
            BulkOperation::Packed(_) => Format::Packed,
            BulkOperation::PackedSingleBlock(_) => Format::PackedSingleBlock,
        }
    }

    pub fn bits_per_value(&self) -> u32 {
        delegate!(self, op => op.bits_per_value())
    }

    pub fn long_block_count(&self) -> usize {
        delegate!(self, op => op.long_block_count())
    }

    pub fn long_value_count(&self) -> usize {
        delegate!(self, op => op.long_value_count())
    }

    pub fn byte_block_count(&self) -> usize {
        delegate!(self, op => op.byte_block_count())
    }

    pub fn byte_value_count(&self) -> usize {
        delegate!(self, op => op.byte_value_count())
    }

    /// Decodes `iterations * long_value_count()` values from 64-bit blocks.
    #[inline]
    pub fn decode_u64(&self, blocks: &[u64], values: &mut [u64], iterations: usize) {
        delegate!(self, op => op.decode_u64(blocks, values, iterations))
    }

    /// Decodes `iterations * byte_value_count()` values from byte blocks.
    #[inline]
    pub fn decode_bytes(&self, blocks: &[u8], values: &mut [u64], iterations: usize) {
        delegate!(self, op => op.decode_bytes(blocks, values, iterations))
    }

    /// Encodes `iterations * long_value_count()` values into 64-bit blocks. Bits of a
    /// value above the width are ignored.
    #[inline]
    pub fn encode_u64(&self, values: &[u64], blocks: &mut [u64], iterations: usize) {
        delegate!(self, op => op.encode_u64(values, blocks, iterations))
    }

    /// Encodes `iterations * byte_value_count()` values into byte blocks.
    #[inline]
    pub fn encode_bytes(&self, values: &[u64], blocks: &mut [u8], iterations: usize) {
        delegate!(self, op => op.encode_bytes(values, blocks, iterations))
    }

    /// Number of iterations to buffer when converting `value_count` values within
    /// a `ram_budget` of bytes (block bytes plus 8 bytes per decoded value).
    ///
    /// Always at least one, and never more than needed to cover `value_count`.
    pub fn compute_iterations(&self, value_count: usize, ram_budget: usize) -> usize {
        let byte_value_count = self.byte_value_count();
        let iterations = ram_budget / (self.byte_block_count() + 8 * byte_value_count);
        if iterations == 0 {
            1
        } else if (iterations - 1) * byte_value_count >= value_count {
            value_count.div_ceil(byte_value_count).max(1)
        } else {
            iterations
        }
    }
}

static PACKED_OPERATIONS: LazyLock<Vec<BulkOperation>> = LazyLock::new(|| {
    (1..=64)
        .filter_map(PackedFixed::new)
        .map(BulkOperation::Packed)
        .collect()
});

static SINGLE_BLOCK_OPERATIONS: LazyLock<Vec<Option<BulkOperation>>> = LazyLock::new(|| {
    (0..=64)
        .map(|bits| {
            BulkOperationPackedSingleBlock::new(bits).map(BulkOperation::PackedSingleBlock)
        })
        .collect()
});

/// `Packed` operation of a width already known to be in `1..=64`.
pub(crate) fn packed_operation(bits_per_value: u32) -> &'static BulkOperation {
    &PACKED_OPERATIONS[bits_per_value as usize - 1]
}

/// Returns the shared operation for `format` at `bits_per_value`.
pub fn bulk_operation(format: Format, bits_per_value: u32) -> Result<&'static BulkOperation> {
    let op = match format {
        Format::Packed if (1..=64).contains(&bits_per_value) => {
            PACKED_OPERATIONS.get(bits_per_value as usize - 1)
        }
        Format::Packed => None,
        Format::PackedSingleBlock => SINGLE_BLOCK_OPERATIONS
            .get(bits_per_value as usize)
            .and_then(Option::as_ref),
    };
    op.ok_or_else(|| {
        Error::invalid_arg(
            "bits_per_value",
            format!("{bits_per_value} is not supported by {format:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let op = bulk_operation(Format::Packed, 10).unwrap();
        assert!(matches!(op, BulkOperation::Packed(_)));
        assert_eq!(op.long_block_count(), 5);
        assert_eq!(op.long_value_count(), 32);

        for bits in [32, 40, 64] {
            let op = bulk_operation(Format::Packed, bits).unwrap();
            assert!(matches!(op, BulkOperation::Packed(fixed) if fixed.bits_per_value() == bits));
            assert_eq!(op.format(), Format::Packed);
        }

        let op = bulk_operation(Format::PackedSingleBlock, 21).unwrap();
        assert_eq!(op.byte_block_count(), 8);
        assert_eq!(op.byte_value_count(), 3);

        assert!(bulk_operation(Format::Packed, 0).is_err());
        assert!(bulk_operation(Format::Packed, 65).is_err());
        assert!(bulk_operation(Format::PackedSingleBlock, 11).is_err());
        assert!(bulk_operation(Format::PackedSingleBlock, 200).is_err());
    }

    #[test]
    fn test_compute_iterations() {
        // width 20: 5 byte blocks hold 2 values
        let op = bulk_operation(Format::Packed, 20).unwrap();
        assert_eq!(op.compute_iterations(5, 1024), 3);
        assert_eq!(op.compute_iterations(1_000_000, 1024), 48);
        assert_eq!(op.compute_iterations(1_000_000, 0), 1);

        // width 64: 8 byte blocks hold 1 value
        let op = bulk_operation(Format::Packed, 64).unwrap();
        assert_eq!(op.compute_iterations(10, 1024), 10);
        assert_eq!(op.compute_iterations(100, 1024), 64);
    }
}
