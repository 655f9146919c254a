// =============================================================================
// katomic — Fixed-Width Words
// =============================================================================
//
// One trait, instantiated once per supported width (1/2/4/8/16 bytes), so the
// dispatcher's logic is written a single time and monomorphized per width.
//
// NATIVE vs LOCKED WIDTHS:
//   A width the target has a native atomic for gets its native operations
//   through `AtomicUxx::from_ptr`. A width without one (u128 always, u64 on
//   cores lacking 64-bit atomics) still implements the trait, but its native
//   operations are unreachable: the lock-freedom predicate never selects
//   them, so the dispatcher always takes a slot instead.
//
// =============================================================================

use core::ops::{BitAnd, BitOr, BitXor, Not};
use core::sync::atomic::Ordering;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width unsigned integer the fallback can operate on.
pub trait Word:
    sealed::Sealed
    + Copy
    + Eq
    + core::fmt::Debug
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
{
    /// Size in bytes.
    const WIDTH: usize;

    /// Whether the native operations below are implemented for this target.
    const NATIVE: bool;

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// # Safety
    /// `ptr` must be valid for reads and writes, aligned to `WIDTH`, and
    /// only ever accessed atomically while shared. `Self::NATIVE` must hold.
    unsafe fn native_load(ptr: *mut Self, order: Ordering) -> Self;

    /// # Safety
    /// As for [`Word::native_load`].
    unsafe fn native_store(ptr: *mut Self, val: Self, order: Ordering);

    /// # Safety
    /// As for [`Word::native_load`].
    unsafe fn native_swap(ptr: *mut Self, val: Self, order: Ordering) -> Self;

    /// Strong compare-and-swap: `Ok(previous)` on success, `Err(actual)`
    /// otherwise.
    ///
    /// # Safety
    /// As for [`Word::native_load`].
    unsafe fn native_compare_exchange(
        ptr: *mut Self,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;

    /// # Safety
    /// As for [`Word::native_load`].
    unsafe fn native_fetch(ptr: *mut Self, op: RmwOp, val: Self, order: Ordering) -> Self;
}

/// Integer read-modify-write operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    /// `!(current & operand)`
    Nand,
}

impl RmwOp {
    pub const ALL: [RmwOp; 6] = [
        RmwOp::Add,
        RmwOp::Sub,
        RmwOp::And,
        RmwOp::Or,
        RmwOp::Xor,
        RmwOp::Nand,
    ];

    /// The new value stored by `current <op> operand`. Arithmetic wraps.
    #[inline]
    pub fn apply<T: Word>(self, current: T, operand: T) -> T {
        match self {
            RmwOp::Add => current.wrapping_add(operand),
            RmwOp::Sub => current.wrapping_sub(operand),
            RmwOp::And => current & operand,
            RmwOp::Or => current | operand,
            RmwOp::Xor => current ^ operand,
            RmwOp::Nand => !(current & operand),
        }
    }
}

macro_rules! word {
    // Width with a native atomic type on this target.
    ($int:ty, $atomic:ty) => {
        impl sealed::Sealed for $int {}

        impl Word for $int {
            const WIDTH: usize = core::mem::size_of::<$int>();
            const NATIVE: bool = true;

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$int>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$int>::wrapping_sub(self, rhs)
            }

            #[inline]
            unsafe fn native_load(ptr: *mut Self, order: Ordering) -> Self {
                // SAFETY: forwarded to the caller.
                unsafe { <$atomic>::from_ptr(ptr) }.load(order)
            }

            #[inline]
            unsafe fn native_store(ptr: *mut Self, val: Self, order: Ordering) {
                // SAFETY: forwarded to the caller.
                unsafe { <$atomic>::from_ptr(ptr) }.store(val, order)
            }

            #[inline]
            unsafe fn native_swap(ptr: *mut Self, val: Self, order: Ordering) -> Self {
                // SAFETY: forwarded to the caller.
                unsafe { <$atomic>::from_ptr(ptr) }.swap(val, order)
            }

            #[inline]
            unsafe fn native_compare_exchange(
                ptr: *mut Self,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                // SAFETY: forwarded to the caller.
                unsafe { <$atomic>::from_ptr(ptr) }.compare_exchange(current, new, success, failure)
            }

            #[inline]
            unsafe fn native_fetch(ptr: *mut Self, op: RmwOp, val: Self, order: Ordering) -> Self {
                // SAFETY: forwarded to the caller.
                let atomic = unsafe { <$atomic>::from_ptr(ptr) };
                match op {
                    RmwOp::Add => atomic.fetch_add(val, order),
                    RmwOp::Sub => atomic.fetch_sub(val, order),
                    RmwOp::And => atomic.fetch_and(val, order),
                    RmwOp::Or => atomic.fetch_or(val, order),
                    RmwOp::Xor => atomic.fetch_xor(val, order),
                    RmwOp::Nand => atomic.fetch_nand(val, order),
                }
            }
        }
    };

    // Width that always goes through a slot.
    ($int:ty) => {
        impl sealed::Sealed for $int {}

        impl Word for $int {
            const WIDTH: usize = core::mem::size_of::<$int>();
            const NATIVE: bool = false;

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$int>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$int>::wrapping_sub(self, rhs)
            }

            unsafe fn native_load(_: *mut Self, _: Ordering) -> Self {
                unreachable!(concat!("no native atomic for ", stringify!($int)))
            }

            unsafe fn native_store(_: *mut Self, _: Self, _: Ordering) {
                unreachable!(concat!("no native atomic for ", stringify!($int)))
            }

            unsafe fn native_swap(_: *mut Self, _: Self, _: Ordering) -> Self {
                unreachable!(concat!("no native atomic for ", stringify!($int)))
            }

            unsafe fn native_compare_exchange(
                _: *mut Self,
                _: Self,
                _: Self,
                _: Ordering,
                _: Ordering,
            ) -> Result<Self, Self> {
                unreachable!(concat!("no native atomic for ", stringify!($int)))
            }

            unsafe fn native_fetch(_: *mut Self, _: RmwOp, _: Self, _: Ordering) -> Self {
                unreachable!(concat!("no native atomic for ", stringify!($int)))
            }
        }
    };
}

#[cfg(target_has_atomic = "8")]
word!(u8, core::sync::atomic::AtomicU8);
#[cfg(not(target_has_atomic = "8"))]
word!(u8);

#[cfg(target_has_atomic = "16")]
word!(u16, core::sync::atomic::AtomicU16);
#[cfg(not(target_has_atomic = "16"))]
word!(u16);

#[cfg(target_has_atomic = "32")]
word!(u32, core::sync::atomic::AtomicU32);
#[cfg(not(target_has_atomic = "32"))]
word!(u32);

#[cfg(target_has_atomic = "64")]
word!(u64, core::sync::atomic::AtomicU64);
#[cfg(not(target_has_atomic = "64"))]
word!(u64);

word!(u128);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nand_inverts_the_conjunction() {
        assert_eq!(RmwOp::Nand.apply(0u8, 0u8), 0xff);
        assert_eq!(RmwOp::Nand.apply(0xffu8, 0xffu8), 0x00);
        assert_eq!(RmwOp::Nand.apply(0xf0u8, 0x3cu8), 0xcf);
        assert_eq!(RmwOp::Nand.apply(u128::MAX, 0), u128::MAX);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(RmwOp::Add.apply(u16::MAX, 1), 0);
        assert_eq!(RmwOp::Sub.apply(0u32, 1), u32::MAX);
        assert_eq!(RmwOp::Add.apply(u128::MAX, 2), 1);
    }

    #[test]
    fn bitwise_operators() {
        assert_eq!(RmwOp::And.apply(0b1100u8, 0b1010), 0b1000);
        assert_eq!(RmwOp::Or.apply(0b1100u8, 0b1010), 0b1110);
        assert_eq!(RmwOp::Xor.apply(0b1100u8, 0b1010), 0b0110);
    }

    #[test]
    fn widths_match_sizes() {
        assert_eq!(<u8 as Word>::WIDTH, 1);
        assert_eq!(<u16 as Word>::WIDTH, 2);
        assert_eq!(<u32 as Word>::WIDTH, 4);
        assert_eq!(<u64 as Word>::WIDTH, 8);
        assert_eq!(<u128 as Word>::WIDTH, 16);
        assert!(!<u128 as Word>::NATIVE);
    }
}
