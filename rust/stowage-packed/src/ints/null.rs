use std::io::Write;

use stowage_common::Result;

use super::{PackedMutable, PackedReader};

/// Array of zeros occupying no storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullMutable {
    value_count: usize,
}

impl NullMutable {
    pub fn new(value_count: usize) -> NullMutable {
        NullMutable { value_count }
    }
}

impl PackedReader for NullMutable {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        debug_assert!(index < self.value_count);
        0
    }

    fn size(&self) -> usize {
        self.value_count
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        let len = arr.len().min(self.value_count - index);
        arr[..len].fill(0);
        len
    }
}

impl PackedMutable for NullMutable {
    fn bits_per_value(&self) -> u32 {
        0
    }

    /// # Panics
    ///
    /// If `value` is not zero.
    fn set(&mut self, index: usize, value: u64) {
        debug_assert!(index < self.value_count);
        assert_eq!(value, 0, "only zeros can be stored in a null array");
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        let len = arr.len().min(self.value_count - index);
        assert!(arr[..len].iter().all(|&v| v == 0), "only zeros can be stored in a null array");
        len
    }

    fn fill(&mut self, _from: usize, _to: usize, value: u64) {
        assert_eq!(value, 0, "only zeros can be stored in a null array");
    }

    fn clear(&mut self) {}

    fn save(&self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }
}
