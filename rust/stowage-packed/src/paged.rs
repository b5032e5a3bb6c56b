//! Large arrays split into fixed-size pages, each page an independent packed array.
//!
//! Sizes and indices are 64-bit so that arrays may exceed the value count of a single
//! page structure.

use stowage_common::Result;

use crate::format::{DEFAULT_BUFFER_SIZE, Format, FormatAndBits};
use crate::growable_writer::GrowableWriter;
use crate::ints::{
    MutableArray, PackedMutable, PackedReader, check_block_size, copy, new_mutable, num_blocks,
};

pub const MIN_PAGE_SIZE: usize = 64;
pub const MAX_PAGE_SIZE: usize = 1 << 30;

/// Allocates the pages of a [`PagedArray`].
pub trait PageFactory: Clone + std::fmt::Debug {
    type Page: PackedMutable + Clone + std::fmt::Debug;

    fn new_page(&self, value_count: usize, bits_per_value: u32) -> Self::Page;
}

/// Pages of a fixed layout.
#[derive(Debug, Clone, Copy)]
pub struct MutablePages {
    format: Format,
}

impl PageFactory for MutablePages {
    type Page = MutableArray;

    fn new_page(&self, value_count: usize, bits_per_value: u32) -> MutableArray {
        new_mutable(value_count, FormatAndBits::new(self.format, bits_per_value))
    }
}

/// Pages that widen independently of each other.
#[derive(Debug, Clone, Copy)]
pub struct GrowablePages {
    acceptable_overhead_ratio: f32,
}

impl PageFactory for GrowablePages {
    type Page = GrowableWriter;

    fn new_page(&self, value_count: usize, bits_per_value: u32) -> GrowableWriter {
        GrowableWriter::new(bits_per_value, value_count, self.acceptable_overhead_ratio)
    }
}

#[derive(Debug, Clone)]
pub struct PagedArray<F: PageFactory> {
    factory: F,
    bits_per_value: u32,
    size: u64,
    page_shift: u32,
    page_mask: u64,
    pages: Vec<F::Page>,
}

/// Paged array of a fixed width.
pub type PagedMutable = PagedArray<MutablePages>;

/// Paged array whose pages widen on demand.
pub type PagedGrowableWriter = PagedArray<GrowablePages>;

impl PagedMutable {
    /// Creates a zero-filled array of `size` values of `bits_per_value` bits, using the
    /// fastest page layout allowed by `acceptable_overhead_ratio`.
    pub fn new(
        size: u64,
        page_size: usize,
        bits_per_value: u32,
        acceptable_overhead_ratio: f32,
    ) -> Result<PagedMutable> {
        let layout =
            FormatAndBits::fastest(Some(page_size), bits_per_value, acceptable_overhead_ratio);
        PagedArray::with_factory(
            MutablePages {
                format: layout.format,
            },
            size,
            page_size,
            layout.bits_per_value,
        )
    }
}

impl PagedGrowableWriter {
    pub fn new(
        size: u64,
        page_size: usize,
        start_bits_per_value: u32,
        acceptable_overhead_ratio: f32,
    ) -> Result<PagedGrowableWriter> {
        PagedArray::with_factory(
            GrowablePages {
                acceptable_overhead_ratio,
            },
            size,
            page_size,
            start_bits_per_value,
        )
    }
}

impl<F: PageFactory> PagedArray<F> {
    /// Creates a zero-filled array of `size` values whose pages come from `factory`.
    ///
    /// `page_size` must be a power of two in `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`.
    pub fn with_factory(
        factory: F,
        size: u64,
        page_size: usize,
        bits_per_value: u32,
    ) -> Result<PagedArray<F>> {
        let page_shift = check_block_size(page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE)?;
        let mut array = PagedArray {
            factory,
            bits_per_value,
            size,
            page_shift,
            page_mask: page_size as u64 - 1,
            pages: Vec::new(),
        };
        let num_pages = num_blocks(size, page_size)?;
        array.pages = (0..num_pages)
            .map(|i| {
                let value_count = if i == num_pages - 1 {
                    array.last_page_size(size)
                } else {
                    page_size
                };
                array.factory.new_page(value_count, bits_per_value)
            })
            .collect();
        Ok(array)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn page_size(&self) -> usize {
        1 << self.page_shift
    }

    pub fn bits_per_value(&self) -> u32 {
        self.bits_per_value
    }

    #[inline]
    pub fn get(&self, index: u64) -> u64 {
        debug_assert!(index < self.size);
        self.pages[self.page_index(index)].get(self.index_in_page(index))
    }

    #[inline]
    pub fn set(&mut self, index: u64, value: u64) {
        debug_assert!(index < self.size);
        let page = self.page_index(index);
        let offset = self.index_in_page(index);
        self.pages[page].set(offset, value);
    }

    /// Returns an array of `new_size` values holding the common prefix of this one.
    /// Pages present in both keep their current width.
    pub fn resize(self, new_size: u64) -> Result<PagedArray<F>> {
        let page_size = self.page_size();
        let num_pages = num_blocks(new_size, page_size)?;
        let mut pages = Vec::with_capacity(num_pages);
        for i in 0..num_pages {
            let value_count = if i == num_pages - 1 {
                self.last_page_size(new_size)
            } else {
                page_size
            };
            let bits_per_value = self
                .pages
                .get(i)
                .map_or(self.bits_per_value, |old| old.bits_per_value());
            let mut page = self.factory.new_page(value_count, bits_per_value);
            if let Some(old) = self.pages.get(i) {
                let len = value_count.min(old.size());
                copy(old, 0, &mut page, 0, len, DEFAULT_BUFFER_SIZE);
            }
            pages.push(page);
        }
        log::debug!(
            "resized paged array from {} to {} values ({} pages)",
            self.size,
            new_size,
            num_pages
        );
        Ok(PagedArray {
            size: new_size,
            pages,
            ..self
        })
    }

    /// Grows the array to at least `min_size` values, over-allocating by an eighth.
    /// Returns the array unchanged if it is already large enough.
    pub fn grow(self, min_size: u64) -> Result<PagedArray<F>> {
        if min_size <= self.size {
            return Ok(self);
        }
        let extra = (min_size >> 3).max(3);
        self.resize(min_size + extra)
    }

    pub fn grow_by_one(self) -> Result<PagedArray<F>> {
        let min_size = self.size + 1;
        self.grow(min_size)
    }

    #[inline]
    fn page_index(&self, index: u64) -> usize {
        (index >> self.page_shift) as usize
    }

    #[inline]
    fn index_in_page(&self, index: u64) -> usize {
        (index & self.page_mask) as usize
    }

    fn last_page_size(&self, size: u64) -> usize {
        match self.index_in_page(size) {
            0 => self.page_size(),
            len => len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{COMPACT, DEFAULT};

    #[test]
    fn test_page_size_validation() {
        assert!(PagedMutable::new(100, 100, 8, COMPACT).is_err());
        assert!(PagedMutable::new(100, 32, 8, COMPACT).is_err());
        assert!(PagedMutable::new(100, 1 << 31, 8, COMPACT).is_err());
        assert!(PagedMutable::new(100, 64, 8, COMPACT).is_ok());
    }

    #[test]
    fn test_get_set_across_pages() {
        fastrand::seed(12);
        let size = 1000;
        let mut array = PagedMutable::new(size, 128, 13, DEFAULT).unwrap();
        assert!(array.bits_per_value() >= 13);
        let values: Vec<u64> = (0..size).map(|_| fastrand::u64(..1 << 13)).collect();
        for (i, &v) in values.iter().enumerate() {
            array.set(i as u64, v);
        }
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(array.get(i as u64), v);
        }
    }

    #[test]
    fn test_resize_and_grow() {
        let mut array = PagedGrowableWriter::new(100, 64, 1, COMPACT).unwrap();
        for i in 0..100 {
            array.set(i, i * 7);
        }
        let array = array.resize(150).unwrap();
        assert_eq!(array.size(), 150);
        assert_eq!(array.get(99), 693);
        assert_eq!(array.get(149), 0);

        let array = array.resize(70).unwrap();
        assert_eq!(array.get(69), 483);

        let array = array.grow(60).unwrap();
        assert_eq!(array.size(), 70);
        let array = array.grow(200).unwrap();
        assert_eq!(array.size(), 225);
        let array = array.grow_by_one().unwrap();
        assert_eq!(array.size(), 254);
        assert_eq!(array.get(10), 70);
    }

    #[test]
    fn test_growable_pages_widen_independently() {
        let mut array = PagedGrowableWriter::new(256, 64, 1, COMPACT).unwrap();
        array.set(3, 1 << 40);
        array.set(200, 1);
        assert_eq!(array.get(3), 1 << 40);
        assert_eq!(array.get(200), 1);
        assert_eq!(array.pages[0].bits_per_value(), 41);
        assert_eq!(array.pages[3].bits_per_value(), 1);
    }
}
