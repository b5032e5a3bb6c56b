//! Byte-level I/O primitives for the Stowage packed integer codecs:
//! - [`DataOutput`] / [`DataInput`]: typed big-endian and variable-length integer
//!   encoding layered over `std::io::Write` / `std::io::Read`.
//! - [`IndexOutput`]: a sequential sink that reports its current write position.
//! - [`ByteSlice`] / [`MemoryInput`]: shared immutable buffers with positional
//!   big-endian reads and a seekable sequential cursor.
//! - [`codec`]: versioned stream headers.

pub mod codec;
pub mod io_extensions;
pub mod memory;
pub mod utils;

pub use io_extensions::{DataInput, DataOutput, IndexOutput};
pub use memory::{ByteSlice, MemoryInput};
