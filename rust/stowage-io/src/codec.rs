//! Versioned stream headers.
//!
//! Layout: `[magic: 4 bytes BE][name: vint length + UTF-8][version: 4 bytes BE]`.

use std::io::{Read, Write};

use stowage_common::{Result, error::Error};

use crate::{DataInput, DataOutput};

pub const CODEC_MAGIC: i32 = 0x3fd7_6c17;

/// Maximum codec name length accepted by [`write_header`].
pub const MAX_CODEC_NAME_LEN: usize = 127;

pub fn write_header<W: Write + ?Sized>(out: &mut W, codec: &str, version: i32) -> Result<()> {
    stowage_common::verify_arg!(codec, codec.is_ascii() && codec.len() <= MAX_CODEC_NAME_LEN);
    out.write_int(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_int(version)?;
    Ok(())
}

/// Length in bytes of the header produced by [`write_header`] for `codec`.
pub fn header_length(codec: &str) -> usize {
    9 + codec.len()
}

/// Reads and validates a header, returning the stored version.
pub fn check_header<R: Read + ?Sized>(
    input: &mut R,
    codec: &str,
    min_version: i32,
    max_version: i32,
) -> Result<i32> {
    let magic = input.read_int()?;
    if magic != CODEC_MAGIC {
        log::debug!("codec header magic mismatch: {magic:#x}");
        return Err(Error::invalid_format(
            "codec header",
            format!("magic {magic:#x} != expected {CODEC_MAGIC:#x}"),
        ));
    }
    let actual = input.read_string()?;
    if actual != codec {
        return Err(Error::invalid_format(
            "codec header",
            format!("codec mismatch: actual '{actual}' vs expected '{codec}'"),
        ));
    }
    let version = input.read_int()?;
    if version < min_version || version > max_version {
        return Err(Error::invalid_format(
            "codec header",
            format!("version {version} outside [{min_version}, {max_version}]"),
        ));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use stowage_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_header_round_trip() {
        let mut out = Vec::new();
        write_header(&mut out, "PackedInts", 2).unwrap();
        assert_eq!(out.len(), header_length("PackedInts"));
        assert_eq!(&out[..4], &[0x3f, 0xd7, 0x6c, 0x17]);

        let mut input = out.as_slice();
        assert_eq!(check_header(&mut input, "PackedInts", 0, 2).unwrap(), 2);
        assert!(input.is_empty());
    }

    #[test]
    fn test_header_rejections() {
        let mut out = Vec::new();
        write_header(&mut out, "PackedInts", 3).unwrap();

        let err = check_header(&mut out.as_slice(), "BlockPacked", 0, 3).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));

        let err = check_header(&mut out.as_slice(), "PackedInts", 0, 2).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));

        let mut corrupted = out.clone();
        corrupted[0] ^= 0xFF;
        let err = check_header(&mut corrupted.as_slice(), "PackedInts", 0, 3).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));

        let err = check_header(&mut &out[..6], "PackedInts", 0, 3).unwrap_err();
        assert!(err.is_end_of_stream());
    }
}
