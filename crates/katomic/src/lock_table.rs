// =============================================================================
// katomic — Lock Table
// =============================================================================
//
// A fixed array of word-sized spin slots, shared by every address in the
// process. There is no per-object lock: an address is hashed to a slot, and
// many unrelated addresses share each slot.
//
// SLOT STATES:
//   0 = unlocked, 1 = locked. The only way from 0 to 1 is a compare-and-swap
//   that fails unless the slot currently holds 0, so there is at most one
//   holder at a time.
//
// THE HASH:
//   addr >> 4          — drop the low 4 bits, so every byte of a 16-byte span
//                        lands on the same slot
//   & mask             — next bits are the direct index
//   ^ (addr >> 20)     — fold higher bits in so that fields of one large
//                        object spread out instead of piling onto a few slots
//
// LIFETIME:
//   The table is statically initialized to all-unlocked, never resized,
//   never torn down. A slot is held for exactly one operation.
//
// =============================================================================

use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::relax::{RelaxStrategy, Spin};

use crate::irq::IrqControl;
#[cfg(feature = "stats")]
use crate::stats::{LockStats, StatsSnapshot};

/// Number of slots in the default table, set at build time through the
/// `KATOMIC_SLOT_COUNT` environment variable (default 1024).
pub const SLOT_COUNT: usize = include!(concat!(env!("OUT_DIR"), "/slot_count.rs"));

const _: () = assert!(SLOT_COUNT.is_power_of_two());

/// Low address bits ignored by the hash.
const GRANULE_SHIFT: u32 = 4;

/// Distance between the index bits and the bits folded into them.
const FOLD_SHIFT: u32 = 16;

/// Maps an address to a slot index in `[0, mask]`.
///
/// `mask` must be one less than a power of two. Total over the address space.
#[inline]
pub const fn slot_index(addr: usize, mask: usize) -> usize {
    let hash = addr >> GRANULE_SHIFT;
    let low = hash & mask;
    ((hash >> FOLD_SHIFT) ^ low) & mask
}

/// A single binary mutual-exclusion word.
#[derive(Debug)]
#[repr(transparent)]
pub struct Slot {
    state: AtomicUsize,
}

impl Slot {
    const UNLOCKED: usize = 0;
    const LOCKED: usize = 1;

    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(Self::UNLOCKED),
        }
    }

    /// Spins until the slot is ours. Returns whether any attempt found the
    /// slot held by someone else.
    ///
    /// Unbounded under contention: no back-off, no queueing, no fairness.
    /// Spurious failures of the weak compare-and-swap (LL/SC cores) are
    /// retried without counting as contention.
    #[inline]
    fn acquire<R: RelaxStrategy>(&self) -> bool {
        let mut contended = false;
        loop {
            // Acquire on success: the previous holder's writes to the
            // protected memory are visible before we touch it.
            match self.state.compare_exchange_weak(
                Self::UNLOCKED,
                Self::LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return contended,
                Err(Self::LOCKED) => contended = true,
                Err(_) => {}
            }
            R::relax();
        }
    }

    /// Publishes the critical section's writes and frees the slot.
    #[inline]
    fn release(&self) {
        self.state.store(Self::UNLOCKED, Ordering::Release);
    }

    /// Whether some context currently holds this slot.
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) == Self::LOCKED
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size table of slots indexed by [`slot_index`].
///
/// # Type Parameters
/// - `N`: number of slots, a power of two (checked at compile time).
/// - `R`: what to do between failed acquisition attempts.
pub struct LockTable<const N: usize = SLOT_COUNT, R = Spin> {
    slots: [Slot; N],
    #[cfg(feature = "stats")]
    stats: LockStats,
    relax: PhantomData<fn() -> R>,
}

impl<const N: usize, R: RelaxStrategy> LockTable<N, R> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "lock table length must be a power of two");
        N - 1
    };

    /// Creates a table with every slot unlocked. `const` so it can back a
    /// `static`.
    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            slots: [const { Slot::new() }; N],
            #[cfg(feature = "stats")]
            stats: LockStats::new(),
            relax: PhantomData,
        }
    }

    /// Number of slots.
    pub const fn len(&self) -> usize {
        N
    }

    /// Always `false`: a table has at least one slot.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Index of the slot guarding `addr`.
    #[inline]
    pub const fn slot_for(&self, addr: usize) -> usize {
        slot_index(addr, Self::MASK)
    }

    /// The slot at `index`, if in range.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Masks interrupts, then spins until the slot for `addr` is held.
    ///
    /// The slot is released and the interrupt state restored when the guard
    /// drops. Acquiring a second slot while holding one is allowed, but the
    /// guards must be dropped in reverse order.
    #[inline]
    pub fn lock<I: IrqControl>(&self, addr: usize) -> SlotGuard<'_, I> {
        // Interrupts go off first: once we start spinning, nothing on this
        // core may try to take the same slot.
        let token = I::save_and_disable();
        let slot = &self.slots[self.slot_for(addr)];
        let contended = slot.acquire::<R>();
        #[cfg(feature = "stats")]
        self.stats.record(contended);
        #[cfg(not(feature = "stats"))]
        let _ = contended;

        SlotGuard {
            slot,
            token,
            _not_send: PhantomData,
        }
    }

    /// Current acquisition counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zeroes the acquisition counters.
    #[cfg(feature = "stats")]
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl<const N: usize, R: RelaxStrategy> Default for LockTable<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a held slot.
///
/// While it exists, the slot is held and local interrupts are masked. Dropping
/// it releases the slot, then restores the saved interrupt state.
///
/// Not `Send`: the interrupt token belongs to the acquiring context.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct SlotGuard<'a, I: IrqControl> {
    slot: &'a Slot,
    token: I::Token,
    _not_send: PhantomData<*const ()>,
}

impl<I: IrqControl> Drop for SlotGuard<'_, I> {
    fn drop(&mut self) {
        self.slot.release();
        // SAFETY: the token was produced by `save_and_disable` in `lock` on
        // this same context (the guard is !Send) and is restored once.
        unsafe { I::restore(self.token) };
    }
}
