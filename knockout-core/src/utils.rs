use crate::{Error, Result};

pub trait NumExt {
    /// Returns the base 2 logarithm of the number, rounding up to the next integer.
    fn ilog2_ceil(self) -> Self;
}

impl NumExt for usize {
    #[inline]
    fn ilog2_ceil(self) -> Self {
        self.next_power_of_two().trailing_zeros() as Self
    }
}

/// Checks that `size` describes a complete elimination tree.
pub fn validate_size(size: usize) -> Result<()> {
    if size >= 2 && size.is_power_of_two() {
        Ok(())
    } else {
        Err(Error::InvalidSize(size))
    }
}
