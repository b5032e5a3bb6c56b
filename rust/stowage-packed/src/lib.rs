//! Packed integer compression engine.
//!
//! Bit-level codecs that store unsigned integers at any width in `1..=64`, and the
//! structures built on top of them:
//! - [`format`]: the `Packed` / `PackedSingleBlock` layouts and the heuristic picking
//!   the cheapest layout for an acceptable memory overhead.
//! - [`bulk`]: per-width encode/decode kernels between packed blocks and value arrays.
//! - [`ints`]: fixed-size random-access arrays sharing the [`PackedMutable`] contract,
//!   plus streaming writers and readers of the same layouts.
//! - [`growable_writer`] and [`paged`]: arrays that widen or resize by replacing their
//!   backing storage.
//! - [`block_packed`] and [`monotonic_block_packed`]: append-only block streams using
//!   delta and linear models.
//! - [`direct`] and [`direct_monotonic`]: random-access on-disk codecs.
//! - [`packed_long_values`]: builders producing immutable compressed `i64` sequences.

pub mod block_packed;
pub mod bulk;
pub mod direct;
pub mod direct_monotonic;
pub mod format;
pub mod growable_writer;
pub mod ints;
pub mod long_values;
pub mod monotonic_block_packed;
pub mod packed_long_values;
pub mod paged;

#[cfg(test)]
mod tests;

pub use format::{Format, FormatAndBits};
pub use growable_writer::GrowableWriter;
pub use ints::{MutableArray, PackedMutable, PackedReader};
pub use long_values::LongValues;
