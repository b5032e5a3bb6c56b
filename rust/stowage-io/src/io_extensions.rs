//! Extension traits adding typed primitive reads and writes to `std::io` streams.
//!
//! Fixed-width integers are big-endian. Variable-length integers store 7 bits per
//! byte, low-order groups first, with the high bit of each byte flagging that more
//! bytes follow. Signed variable-length integers are zig-zag encoded first.
//!
//! The method names overlap with byteorder's `ReadBytesExt` / `WriteBytesExt`
//! (`read_int`, `write_int`, ...). Import only one of the two families in a scope.

use std::io::{Read, Write};

use byteorder::{BE, ReadBytesExt, WriteBytesExt};
use stowage_bits::{zigzag_decode, zigzag_decode_i32, zigzag_encode, zigzag_encode_i32};

use crate::utils::malformed;

/// Typed primitive writes over any [`std::io::Write`].
pub trait DataOutput: Write {
    fn write_byte(&mut self, value: u8) -> std::io::Result<()> {
        self.write_u8(value)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.write_all(buf)
    }

    fn write_short(&mut self, value: i16) -> std::io::Result<()> {
        self.write_i16::<BE>(value)
    }

    fn write_int(&mut self, value: i32) -> std::io::Result<()> {
        self.write_i32::<BE>(value)
    }

    fn write_long(&mut self, value: i64) -> std::io::Result<()> {
        self.write_i64::<BE>(value)
    }

    /// Writes the IEEE-754 bit pattern of `value` as a big-endian 4-byte integer.
    fn write_float_bits(&mut self, value: f32) -> std::io::Result<()> {
        self.write_u32::<BE>(value.to_bits())
    }

    /// Writes a variable-length unsigned 32-bit integer (1 to 5 bytes).
    fn write_vint(&mut self, mut value: u32) -> std::io::Result<()> {
        while value & !0x7F != 0 {
            self.write_u8(((value & 0x7F) | 0x80) as u8)?;
            value >>= 7;
        }
        self.write_u8(value as u8)
    }

    /// Writes a variable-length unsigned 64-bit integer (1 to 10 bytes).
    fn write_vlong(&mut self, mut value: u64) -> std::io::Result<()> {
        while value & !0x7F != 0 {
            self.write_u8(((value & 0x7F) | 0x80) as u8)?;
            value >>= 7;
        }
        self.write_u8(value as u8)
    }

    /// Writes a zig-zag encoded variable-length signed 32-bit integer.
    fn write_zint(&mut self, value: i32) -> std::io::Result<()> {
        self.write_vint(zigzag_encode_i32(value))
    }

    /// Writes a zig-zag encoded variable-length signed 64-bit integer.
    fn write_zlong(&mut self, value: i64) -> std::io::Result<()> {
        self.write_vlong(zigzag_encode(value))
    }

    /// Writes a UTF-8 string prefixed with its byte length as a vint.
    fn write_string(&mut self, value: &str) -> std::io::Result<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "string too long"))?;
        self.write_vint(len)?;
        self.write_all(value.as_bytes())
    }
}

impl<W> DataOutput for W where W: Write + ?Sized {}

/// Typed primitive reads over any [`std::io::Read`].
///
/// End of stream surfaces as [`std::io::ErrorKind::UnexpectedEof`].
pub trait DataInput: Read {
    fn read_byte(&mut self) -> std::io::Result<u8> {
        self.read_u8()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.read_exact(buf)
    }

    fn read_short(&mut self) -> std::io::Result<i16> {
        self.read_i16::<BE>()
    }

    fn read_int(&mut self) -> std::io::Result<i32> {
        self.read_i32::<BE>()
    }

    fn read_long(&mut self) -> std::io::Result<i64> {
        self.read_i64::<BE>()
    }

    fn read_float_bits(&mut self) -> std::io::Result<f32> {
        Ok(f32::from_bits(self.read_u32::<BE>()?))
    }

    fn read_vint(&mut self) -> std::io::Result<u32> {
        let mut value = 0u32;
        for shift in (0..35).step_by(7) {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u32) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed("vint"))
    }

    fn read_vlong(&mut self) -> std::io::Result<u64> {
        let mut value = 0u64;
        for shift in (0..70).step_by(7) {
            let b = self.read_u8()?;
            value |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed("vlong"))
    }

    fn read_zint(&mut self) -> std::io::Result<i32> {
        Ok(zigzag_decode_i32(self.read_vint()?))
    }

    fn read_zlong(&mut self) -> std::io::Result<i64> {
        Ok(zigzag_decode(self.read_vlong()?))
    }

    fn read_string(&mut self) -> std::io::Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = Vec::new();
        (&mut *self).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        String::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Skips over `count` bytes, failing with `UnexpectedEof` if the stream is shorter.
    fn skip_bytes(&mut self, count: u64) -> std::io::Result<()> {
        let skipped = std::io::copy(&mut (&mut *self).take(count), &mut std::io::sink())?;
        if skipped < count {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

impl<R> DataInput for R where R: Read + ?Sized {}

/// A sequential output that knows how many bytes were written so far.
pub trait IndexOutput: Write {
    /// Current write position, i.e. the number of bytes written.
    fn file_pointer(&self) -> u64;
}

impl IndexOutput for Vec<u8> {
    fn file_pointer(&self) -> u64 {
        self.len() as u64
    }
}

impl<T> IndexOutput for &mut T
where
    T: IndexOutput + ?Sized,
{
    fn file_pointer(&self) -> u64 {
        (**self).file_pointer()
    }
}

#[cfg(test)]
mod tests {
    use super::{DataInput, DataOutput, IndexOutput};

    #[test]
    fn test_vint_layout() {
        let mut out = Vec::new();
        out.write_vint(0).unwrap();
        out.write_vint(127).unwrap();
        out.write_vint(128).unwrap();
        out.write_vint(16384).unwrap();
        assert_eq!(out, [0x00, 0x7F, 0x80, 0x01, 0x80, 0x80, 0x01]);

        let mut input = out.as_slice();
        assert_eq!(input.read_vint().unwrap(), 0);
        assert_eq!(input.read_vint().unwrap(), 127);
        assert_eq!(input.read_vint().unwrap(), 128);
        assert_eq!(input.read_vint().unwrap(), 16384);
        assert!(input.read_vint().is_err());
    }

    #[test]
    fn test_vlong_extremes() {
        let mut out = Vec::new();
        out.write_vlong(u64::MAX).unwrap();
        assert_eq!(out.len(), 10);
        out.write_zlong(i64::MIN).unwrap();
        out.write_zlong(-3).unwrap();
        out.write_zint(i32::MIN).unwrap();

        let mut input = out.as_slice();
        assert_eq!(input.read_vlong().unwrap(), u64::MAX);
        assert_eq!(input.read_zlong().unwrap(), i64::MIN);
        assert_eq!(input.read_zlong().unwrap(), -3);
        assert_eq!(input.read_zint().unwrap(), i32::MIN);
    }

    #[test]
    fn test_malformed_vint() {
        let bytes = [0xFFu8; 6];
        let mut input = &bytes[..];
        let err = input.read_vint().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let mut out = Vec::new();
        out.write_short(0x0102).unwrap();
        out.write_int(0x03040506).unwrap();
        out.write_long(-2).unwrap();
        out.write_float_bits(1.5).unwrap();
        out.write_string("PackedInts").unwrap();
        assert_eq!(&out[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(out.file_pointer(), 6 + 8 + 4 + 11);

        let mut input = out.as_slice();
        assert_eq!(input.read_short().unwrap(), 0x0102);
        assert_eq!(input.read_int().unwrap(), 0x03040506);
        assert_eq!(input.read_long().unwrap(), -2);
        assert_eq!(input.read_float_bits().unwrap(), 1.5);
        assert_eq!(input.read_string().unwrap(), "PackedInts");
    }

    #[test]
    fn test_skip_bytes() {
        let bytes = [1u8, 2, 3, 4, 5];
        let mut input = &bytes[..];
        input.skip_bytes(3).unwrap();
        assert_eq!(input.read_byte().unwrap(), 4);
        let err = input.skip_bytes(5).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_truncated_string() {
        let mut out = Vec::new();
        out.write_vint(u32::MAX).unwrap();
        out.write_bytes(b"abc").unwrap();
        let err = out.as_slice().read_string().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_skip_bytes_unsized_reader() {
        let bytes = [9u8, 8, 7, 6];
        let mut slice = &bytes[..];
        let input: &mut dyn std::io::Read = &mut slice;
        input.skip_bytes(2).unwrap();
        assert_eq!(input.read_byte().unwrap(), 7);
        assert!(input.skip_bytes(2).is_err());
    }

    #[test]
    fn test_random_vlongs() {
        fastrand::seed(11);
        let values: Vec<u64> = (0..500)
            .map(|_| fastrand::u64(..) >> fastrand::u32(0..64))
            .collect();
        let mut out = Vec::new();
        for &v in &values {
            out.write_vlong(v).unwrap();
        }
        let mut input = out.as_slice();
        for &v in &values {
            assert_eq!(input.read_vlong().unwrap(), v);
        }
    }
}
