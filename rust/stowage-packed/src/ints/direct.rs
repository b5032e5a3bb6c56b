use std::io::{Read, Write};

use byteorder::{BE, ByteOrder};
use stowage_common::Result;

use super::{PackedMutable, PackedReader, read_bytes};

/// Native word type backing a [`Direct`] array.
pub trait DirectWord: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
    const BITS: u32;
    const BYTES: usize = Self::BITS as usize / 8;

    fn from_u64(value: u64) -> Self;

    fn to_u64(self) -> u64;

    /// Serializes `src` big-endian into `dst` (`src.len() * BYTES` bytes).
    fn encode(src: &[Self], dst: &mut [u8]);

    /// Deserializes big-endian `src` into `dst`.
    fn decode(src: &[u8], dst: &mut [Self]);
}

impl DirectWord for u8 {
    const BITS: u32 = 8;

    #[inline]
    fn from_u64(value: u64) -> u8 {
        value as u8
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self as u64
    }

    fn encode(src: &[u8], dst: &mut [u8]) {
        dst.copy_from_slice(src);
    }

    fn decode(src: &[u8], dst: &mut [u8]) {
        dst.copy_from_slice(src);
    }
}

macro_rules! impl_direct_word {
    ($word:ty, $bits:literal, $write_into:ident, $read_into:ident) => {
        impl DirectWord for $word {
            const BITS: u32 = $bits;

            #[inline]
            fn from_u64(value: u64) -> $word {
                value as $word
            }

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            fn encode(src: &[$word], dst: &mut [u8]) {
                BE::$write_into(src, dst);
            }

            fn decode(src: &[u8], dst: &mut [$word]) {
                BE::$read_into(src, dst);
            }
        }
    };
}

impl_direct_word!(u16, 16, write_u16_into, read_u16_into);
impl_direct_word!(u32, 32, write_u32_into, read_u32_into);
impl_direct_word!(u64, 64, write_u64_into, read_u64_into);

/// Array storing one value per native word. Used for the byte-aligned widths.
#[derive(Debug, Clone)]
pub struct Direct<T: DirectWord> {
    values: Vec<T>,
}

pub type Direct8 = Direct<u8>;
pub type Direct16 = Direct<u16>;
pub type Direct32 = Direct<u32>;
pub type Direct64 = Direct<u64>;

impl<T: DirectWord> Direct<T> {
    pub fn new(value_count: usize) -> Direct<T> {
        Direct {
            values: vec![T::default(); value_count],
        }
    }

    pub(crate) fn load<R: Read + ?Sized>(input: &mut R, value_count: usize) -> Result<Direct<T>> {
        let bytes = read_bytes(input, value_count * T::BYTES)?;
        let mut values = vec![T::default(); value_count];
        T::decode(&bytes, &mut values);
        Ok(Direct { values })
    }
}

impl<T: DirectWord> PackedReader for Direct<T> {
    #[inline]
    fn get(&self, index: usize) -> u64 {
        self.values[index].to_u64()
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn bulk_get(&self, index: usize, arr: &mut [u64]) -> usize {
        let len = arr.len().min(self.values.len() - index);
        for (dst, &v) in arr[..len].iter_mut().zip(&self.values[index..index + len]) {
            *dst = v.to_u64();
        }
        len
    }
}

impl<T: DirectWord> PackedMutable for Direct<T> {
    fn bits_per_value(&self) -> u32 {
        T::BITS
    }

    #[inline]
    fn set(&mut self, index: usize, value: u64) {
        self.values[index] = T::from_u64(value);
    }

    fn bulk_set(&mut self, index: usize, arr: &[u64]) -> usize {
        let len = arr.len().min(self.values.len() - index);
        for (dst, &v) in self.values[index..index + len].iter_mut().zip(&arr[..len]) {
            *dst = T::from_u64(v);
        }
        len
    }

    fn fill(&mut self, from: usize, to: usize, value: u64) {
        self.values[from..to].fill(T::from_u64(value));
    }

    fn clear(&mut self) {
        self.values.fill(T::default());
    }

    fn save(&self, out: &mut dyn Write) -> Result<()> {
        let mut bytes = vec![0u8; self.values.len() * T::BYTES];
        T::encode(&self.values, &mut bytes);
        out.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_save() {
        let mut array = Direct16::new(2);
        array.set(0, 0x1234);
        array.set(1, 0xABCD);
        let mut out = Vec::new();
        array.save(&mut out).unwrap();
        assert_eq!(out, [0x12, 0x34, 0xAB, 0xCD]);

        let loaded = Direct16::load(&mut out.as_slice(), 2).unwrap();
        assert_eq!(loaded.get(1), 0xABCD);
    }

    #[test]
    fn test_fill_and_bulk() {
        let mut array = Direct32::new(10);
        array.fill(2, 7, 0xFFFF_FFFF);
        let mut buf = [0u64; 16];
        assert_eq!(array.bulk_get(1, &mut buf), 9);
        let full = 0xFFFF_FFFF;
        assert_eq!(&buf[..8], &[0, full, full, full, full, full, 0, 0]);

        assert_eq!(array.bulk_set(8, &[5, 6, 7]), 2);
        assert_eq!(array.get(9), 6);
        array.clear();
        assert_eq!(array.get(3), 0);
    }

    #[test]
    fn test_truncated_input() {
        let err = Direct64::load(&mut [0u8; 12].as_slice(), 2).unwrap_err();
        assert!(err.is_end_of_stream());
    }
}
