use std::io::Write;

use stowage_bits::{max_value, unsigned_bits_required};
use stowage_common::Result;

use crate::format::{DEFAULT_BUFFER_SIZE, Format};
use crate::ints::{MutableArray, PackedMutable, PackedReader, copy, get_mutable};

/// A packed array that widens its storage whenever a value does not fit the current
/// width. Existing values are preserved across widenings; the width never shrinks.
#[derive(Debug, Clone)]
pub struct GrowableWriter {
    current: MutableArray,
    current_mask: u64,
    acceptable_overhead_ratio: f32,
}

impl GrowableWriter {
    pub fn new(
        start_bits_per_value: u32,
        value_count: usize,
        acceptable_overhead_ratio: f32,
    ) -> GrowableWriter {
        let current = get_mutable(value_count, start_bits_per_value, acceptable_overhead_ratio);
        GrowableWriter {
            current_mask: max_value(current.bits_per_value()),
            current,
            acceptable_overhead_ratio,
        }
    }

    /// The backing array.
    pub fn get_mutable(&self) -> &MutableArray {
        &self.current
    }

    pub fn into_inner(self) -> MutableArray {
        self.current
    }

    fn ensure_capacity(&mut self, value: u64) {
        if value & self.current_mask == value {
            return;
        }
        let bits_required = unsigned_bits_required(value);
        debug_assert!(bits_required > self.current.bits_per_value());
        let value_count = self.size();
        let mut next = get_mutable(value_count, bits_required, self.acceptable_overhead_ratio);
        copy(&self.current, 0, &mut next, 0, value_count, DEFAULT_BUFFER_SIZE);
        log::debug!(
            "growable writer widened from {} to {} bits ({} values)",
            self.current.bits_per_value(),
            next.bits_per_value(),
            value_count
        );
        self.current_mask = max_value(next.bits_per_value());
        self.current = next;
    }

    /// Returns a new writer of `new_size` values holding a copy of the common prefix.
    pub fn resize(&self, new_size: usize) -> GrowableWriter {
        let mut next = GrowableWriter::new(
            self.bits_per_value(),
            new_size,
            self.acceptable_overhead_ratio,
        );
        let limit = self.size().min(new_size);
        copy(&self.current, 0, &mut next.current, 0, limit, DEFAULT_BUFFER_SIZE);
        next
    }
}

impl PackedReader for GrowableWriter {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        self.current.get(index)
    }

    fn size(&self) -> usize {
        self.current.size()
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        self.current.bulk_get(index, arr)
    }
}

impl PackedMutable for GrowableWriter {
    fn bits_per_value(&self) -> u32 {
        self.current.bits_per_value()
    }

    fn set(&mut self, index: usize, value: u64) {
        self.ensure_capacity(value);
        self.current.set(index, value);
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        let max = arr.iter().fold(0, |max, &v| max | v);
        self.ensure_capacity(max);
        self.current.bulk_set(index, arr)
    }

    fn fill(&mut self, from: usize, to: usize, value: u64) {
        self.ensure_capacity(value);
        self.current.fill(from, to, value);
    }

    fn clear(&mut self) {
        self.current.clear();
    }

    fn format(&self) -> Format {
        self.current.format()
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        self.current.save(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{COMPACT, DEFAULT};

    #[test]
    fn test_widening_preserves_values() {
        let mut writer = GrowableWriter::new(1, 100, COMPACT);
        assert_eq!(writer.bits_per_value(), 1);
        writer.set(0, 1);
        writer.set(1, 3);
        assert_eq!(writer.bits_per_value(), 2);
        writer.set(50, 1000);
        assert_eq!(writer.bits_per_value(), 10);
        writer.set(99, u64::MAX);
        assert_eq!(writer.bits_per_value(), 64);
        assert_eq!(writer.get(0), 1);
        assert_eq!(writer.get(1), 3);
        assert_eq!(writer.get(50), 1000);
        assert_eq!(writer.get(99), u64::MAX);
        assert_eq!(writer.get(98), 0);

        // the width never shrinks
        writer.set(99, 0);
        assert_eq!(writer.bits_per_value(), 64);
    }

    #[test]
    fn test_bulk_set_grows_once() {
        let mut writer = GrowableWriter::new(2, 10, DEFAULT);
        assert_eq!(writer.bulk_set(2, &[1, 300, 5]), 3);
        assert!(writer.bits_per_value() >= 9);
        assert_eq!(writer.get(3), 300);
        writer.fill(5, 10, 1 << 20);
        assert_eq!(writer.get(9), 1 << 20);
        assert_eq!(writer.get(2), 1);
    }

    #[test]
    fn test_resize() {
        let mut writer = GrowableWriter::new(4, 5, COMPACT);
        for i in 0..5 {
            writer.set(i, i as u64 * 3);
        }
        let bigger = writer.resize(8);
        assert_eq!(bigger.size(), 8);
        assert_eq!(bigger.get(4), 12);
        assert_eq!(bigger.get(7), 0);
        let smaller = writer.resize(2);
        assert_eq!(smaller.size(), 2);
        assert_eq!(smaller.get(1), 3);
    }
}
