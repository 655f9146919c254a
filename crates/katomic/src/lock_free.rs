//! Lock-freedom predicate.
//!
//! A `size`-byte access at `addr` is lock-free iff the target has a native
//! atomic of exactly that width and `addr` is aligned to it. Nothing else is
//! consulted, so every caller (compiler-generated or not) reaches the same
//! answer for the same object.

use bitflags::bitflags;

bitflags! {
    /// Access widths, in bytes, that the fallback recognizes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Widths: u8 {
        const W1 = 1;
        const W2 = 2;
        const W4 = 4;
        const W8 = 8;
        const W16 = 16;
    }
}

impl Widths {
    /// Widths this target always handles with a native atomic instruction
    /// at natural alignment.
    ///
    /// `W16` is never included: there is no stable 128-bit atomic type, so
    /// 16-byte objects always go through a slot.
    pub const NATIVE: Widths = {
        let mut widths = Widths::empty();
        if cfg!(target_has_atomic = "8") {
            widths = widths.union(Widths::W1);
        }
        if cfg!(target_has_atomic = "16") {
            widths = widths.union(Widths::W2);
        }
        if cfg!(target_has_atomic = "32") {
            widths = widths.union(Widths::W4);
        }
        if cfg!(target_has_atomic = "64") {
            widths = widths.union(Widths::W8);
        }
        widths
    };

    /// The single width matching `size`, if it is a recognized one.
    pub const fn from_size(size: usize) -> Option<Widths> {
        if size == 0 || size > 16 || !size.is_power_of_two() {
            return None;
        }
        Widths::from_bits(size as u8)
    }
}

/// Whether a `size`-byte atomic access at `addr` is natively lock-free.
#[inline]
pub const fn is_lock_free(size: usize, addr: usize) -> bool {
    match Widths::from_size(size) {
        Some(width) => Widths::NATIVE.contains(width) && addr % size == 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Word;

    #[test]
    fn unrecognized_sizes_are_never_lock_free() {
        for size in [0, 3, 5, 6, 7, 9, 12, 24, 32, 64] {
            assert!(!is_lock_free(size, 0), "size {size}");
            assert!(Widths::from_size(size).is_none(), "size {size}");
        }
    }

    #[test]
    fn sixteen_bytes_always_take_a_slot() {
        assert!(!is_lock_free(16, 0));
        assert_eq!(Widths::from_size(16), Some(Widths::W16));
    }

    #[test]
    fn misalignment_defeats_native_widths() {
        for size in [2, 4, 8] {
            assert!(!is_lock_free(size, 0x1001), "size {size}");
            assert!(!is_lock_free(size, 0x1000 + size / 2), "size {size}");
        }
    }

    #[test]
    fn aligned_native_widths_are_lock_free() {
        for size in [1, 2, 4, 8] {
            let native = Widths::NATIVE.contains(Widths::from_size(size).unwrap());
            assert_eq!(is_lock_free(size, 0x1000), native, "size {size}");
        }
    }

    #[test]
    fn native_set_matches_word_impls() {
        assert_eq!(Widths::NATIVE.contains(Widths::W1), <u8 as Word>::NATIVE);
        assert_eq!(Widths::NATIVE.contains(Widths::W2), <u16 as Word>::NATIVE);
        assert_eq!(Widths::NATIVE.contains(Widths::W4), <u32 as Word>::NATIVE);
        assert_eq!(Widths::NATIVE.contains(Widths::W8), <u64 as Word>::NATIVE);
        assert_eq!(Widths::NATIVE.contains(Widths::W16), <u128 as Word>::NATIVE);
    }
}
