/// Random access to a sequence of `i64` values addressed by a 64-bit index.
pub trait LongValues {
    /// Returns the value at `index`. The index must be in bounds of the sequence.
    fn get(&self, index: u64) -> i64;
}

impl<T: LongValues + ?Sized> LongValues for &T {
    fn get(&self, index: u64) -> i64 {
        (**self).get(index)
    }
}

impl<T: LongValues + ?Sized> LongValues for Box<T> {
    fn get(&self, index: u64) -> i64 {
        (**self).get(index)
    }
}
