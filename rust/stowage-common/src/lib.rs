//! Core definitions (errors, results and precondition macros), relied upon by all stowage-* crates.

pub mod error;
pub mod result;

pub use result::Result;
