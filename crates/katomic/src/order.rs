//! C11 memory-order model.
//!
//! Compiler-generated calls pass the ordering as a plain integer using the
//! C11 numbering. On the native path the ordering is forwarded to the
//! instruction; on the slot path the slot's own acquire/release pairing
//! already covers any request, so the value is ignored there.
//!
//! Rust's atomics reject some combinations C leaves undefined (an acquire
//! store, a release load). Those are promoted to `SeqCst`: the fallback may
//! be stronger than asked, never weaker.

use core::fmt;
use core::sync::atomic::Ordering;

/// Requested ordering of an atomic operation, numbered as the C11 `memory_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum MemoryOrder {
    Relaxed = 0,
    Consume = 1,
    Acquire = 2,
    Release = 3,
    AcqRel = 4,
    SeqCst = 5,
}

impl MemoryOrder {
    /// Decodes a raw model, treating anything unknown as `SeqCst`.
    #[inline]
    pub fn from_raw_or_seq_cst(raw: i32) -> Self {
        Self::try_from(raw).unwrap_or(Self::SeqCst)
    }

    /// Ordering for a plain load (also a compare-exchange failure).
    #[inline]
    pub const fn load(self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::Consume | Self::Acquire => Ordering::Acquire,
            Self::Release | Self::AcqRel | Self::SeqCst => Ordering::SeqCst,
        }
    }

    /// Ordering for a plain store.
    #[inline]
    pub const fn store(self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::Release => Ordering::Release,
            Self::Consume | Self::Acquire | Self::AcqRel | Self::SeqCst => Ordering::SeqCst,
        }
    }

    /// Ordering for exchange, fetch-op and compare-exchange success.
    #[inline]
    pub const fn rmw(self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::Consume | Self::Acquire => Ordering::Acquire,
            Self::Release => Ordering::Release,
            Self::AcqRel => Ordering::AcqRel,
            Self::SeqCst => Ordering::SeqCst,
        }
    }
}

impl TryFrom<i32> for MemoryOrder {
    type Error = InvalidMemoryOrder;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => Self::Relaxed,
            1 => Self::Consume,
            2 => Self::Acquire,
            3 => Self::Release,
            4 => Self::AcqRel,
            5 => Self::SeqCst,
            _ => return Err(InvalidMemoryOrder(raw)),
        })
    }
}

impl From<Ordering> for MemoryOrder {
    fn from(order: Ordering) -> Self {
        match order {
            Ordering::Relaxed => Self::Relaxed,
            Ordering::Acquire => Self::Acquire,
            Ordering::Release => Self::Release,
            Ordering::AcqRel => Self::AcqRel,
            // `Ordering` is non-exhaustive; anything new is at most SeqCst.
            _ => Self::SeqCst,
        }
    }
}

/// A raw memory-order value outside the C11 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMemoryOrder(pub i32);

impl fmt::Display for InvalidMemoryOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid memory order {}", self.0)
    }
}

impl core::error::Error for InvalidMemoryOrder {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_follow_c11_numbering() {
        for raw in 0..=5 {
            let order = MemoryOrder::try_from(raw).unwrap();
            assert_eq!(order as i32, raw);
        }
        assert_eq!(MemoryOrder::try_from(6), Err(InvalidMemoryOrder(6)));
        assert_eq!(MemoryOrder::try_from(-1), Err(InvalidMemoryOrder(-1)));
        assert_eq!(MemoryOrder::from_raw_or_seq_cst(42), MemoryOrder::SeqCst);
    }

    #[test]
    fn invalid_combinations_are_promoted() {
        assert_eq!(MemoryOrder::Release.load(), Ordering::SeqCst);
        assert_eq!(MemoryOrder::AcqRel.load(), Ordering::SeqCst);
        assert_eq!(MemoryOrder::Acquire.store(), Ordering::SeqCst);
        assert_eq!(MemoryOrder::Consume.store(), Ordering::SeqCst);
        assert_eq!(MemoryOrder::AcqRel.store(), Ordering::SeqCst);
    }

    #[test]
    fn valid_combinations_pass_through() {
        assert_eq!(MemoryOrder::Relaxed.load(), Ordering::Relaxed);
        assert_eq!(MemoryOrder::Consume.load(), Ordering::Acquire);
        assert_eq!(MemoryOrder::Release.store(), Ordering::Release);
        assert_eq!(MemoryOrder::Consume.rmw(), Ordering::Acquire);
        assert_eq!(MemoryOrder::AcqRel.rmw(), Ordering::AcqRel);
        assert_eq!(MemoryOrder::from(Ordering::SeqCst), MemoryOrder::SeqCst);
        assert_eq!(MemoryOrder::from(Ordering::Release), MemoryOrder::Release);
    }

    #[test]
    fn display_names_the_value() {
        use std::string::ToString;

        assert_eq!(InvalidMemoryOrder(9).to_string(), "invalid memory order 9");
    }
}
