// =============================================================================
// katomic — Atomic Operation Dispatcher
// =============================================================================
//
// Every operation follows the same two-way split:
//
//   is_lock_free(size, addr)?
//     yes → native atomic instruction of exactly that width, with the
//           caller's ordering
//     no  → lock the address's slot, plain (non-atomic) copy / compare /
//           modify, unlock
//
// On the slot path the requested ordering is ignored: the slot's acquire on
// lock and release on unlock order the critical section at least as strongly
// as any request.
//
// TWO CALL SHAPES:
//   *_bytes   — size known only at run time. Values travel through caller
//               buffers. Used for arbitrary structs.
//   load<T>.. — size fixed by `T: Word`. Values travel by value. Includes
//               the integer read-modify-write operations, which only make
//               sense at a fixed width.
//
// SINGLE-ADDRESS LOCKING:
//   Only the target address is ever locked. Value buffers (`dest`,
//   `expected`, `desired`, ...) belong to the caller and are not shared, so
//   no operation here holds two slots and no lock ordering is needed.
//
// =============================================================================

use core::marker::PhantomData;
use core::ptr;
use core::slice;

use spin::relax::{RelaxStrategy, Spin};

use crate::irq::IrqControl;
use crate::lock_free::{Widths, is_lock_free};
use crate::lock_table::{LockTable, SLOT_COUNT, SlotGuard};
use crate::order::MemoryOrder;
use crate::word::{RmwOp, Word};

/// Runs `$body` with `$t` bound to the native word type for `$size`, then
/// returns its value, if `$size` bytes at `$addr` are lock-free. Falls
/// through otherwise.
macro_rules! return_if_lock_free {
    ($size:expr, $addr:expr, |$t:ident| $body:expr) => {
        if is_lock_free($size, $addr) {
            match $size {
                1 => {
                    type $t = u8;
                    return $body;
                }
                2 => {
                    type $t = u16;
                    return $body;
                }
                4 => {
                    type $t = u32;
                    return $body;
                }
                8 => {
                    type $t = u64;
                    return $body;
                }
                16 => {
                    type $t = u128;
                    return $body;
                }
                _ => {}
            }
        }
    };
}

/// Atomic operations on arbitrary memory, backed by a lock table.
///
/// # Type Parameters
/// - `I`: how local interrupts are masked while a slot is held.
/// - `N`: lock table length (power of two).
/// - `R`: relax strategy between failed slot acquisitions.
///
/// # Examples
/// ```
/// use katomic::{AtomicFallback, HostedIrq, MemoryOrder};
///
/// static ATOMICS: AtomicFallback<HostedIrq> = AtomicFallback::new();
///
/// let mut value = [0u8; 24];
/// let update = [7u8; 24];
/// unsafe {
///     ATOMICS.store_bytes(24, value.as_mut_ptr(), update.as_ptr(), MemoryOrder::SeqCst);
/// }
/// assert_eq!(value, update);
/// ```
pub struct AtomicFallback<I, const N: usize = SLOT_COUNT, R = Spin> {
    table: LockTable<N, R>,
    irq: PhantomData<fn() -> I>,
}

impl<I: IrqControl, const N: usize, R: RelaxStrategy> AtomicFallback<I, N, R> {
    /// Creates a fallback with a fresh, all-unlocked table.
    pub const fn new() -> Self {
        Self {
            table: LockTable::new(),
            irq: PhantomData,
        }
    }

    /// The lock table behind the slot path.
    pub fn table(&self) -> &LockTable<N, R> {
        &self.table
    }

    /// Whether `size` bytes at `addr` are handled natively. Never locks.
    #[inline]
    pub fn is_lock_free(&self, size: usize, addr: usize) -> bool {
        is_lock_free(size, addr)
    }

    /// Logs the table geometry and native widths, for boot-time reporting.
    pub fn log_config(&self) {
        log::debug!(
            "katomic: {} slots, native widths {:?}",
            self.table.len(),
            Widths::NATIVE
        );
    }

    /// Logs the table's acquisition counters, warning if contention is high.
    ///
    /// Must not be called while holding a slot: the logger may itself use
    /// fallback atomics.
    #[cfg(feature = "stats")]
    pub fn log_stats(&self) {
        let stats = self.table.stats();
        log::info!(
            "katomic: {} slot acquisitions, {} contended",
            stats.acquisitions,
            stats.contended
        );
        if stats.is_hot() {
            log::warn!(
                "katomic: slot contention above 1/8 of acquisitions; consider a larger KATOMIC_SLOT_COUNT"
            );
        }
    }

    #[inline]
    fn lock(&self, addr: usize) -> SlotGuard<'_, I> {
        self.table.lock::<I>(addr)
    }

    // -------------------------------------------------------------------------
    // Generic size
    // -------------------------------------------------------------------------

    /// Atomically copies `size` bytes from `src` into `dest`.
    ///
    /// Atomic with respect to `src` only.
    ///
    /// # Safety
    /// `src` must be valid for `size`-byte reads and `dest` for `size`-byte
    /// writes; they must not overlap. Every concurrent access to `src` must go
    /// through this fallback or through native atomics of the same
    /// lock-freedom verdict.
    pub unsafe fn load_bytes(&self, size: usize, src: *const u8, dest: *mut u8, order: MemoryOrder) {
        return_if_lock_free!(size, src.addr(), |T| unsafe {
            let val = T::native_load(src.cast_mut().cast(), order.load());
            dest.cast::<T>().write_unaligned(val)
        });

        let _guard = self.lock(src.addr());
        // SAFETY: forwarded to the caller; the slot excludes other writers.
        unsafe { ptr::copy_nonoverlapping(src, dest, size) };
    }

    /// Atomically copies `size` bytes from `src` into `dest`.
    ///
    /// Atomic with respect to `dest` only.
    ///
    /// # Safety
    /// As for [`AtomicFallback::load_bytes`], with `dest` as the shared
    /// location.
    pub unsafe fn store_bytes(&self, size: usize, dest: *mut u8, src: *const u8, order: MemoryOrder) {
        return_if_lock_free!(size, dest.addr(), |T| unsafe {
            let val = src.cast::<T>().read_unaligned();
            T::native_store(dest.cast(), val, order.store())
        });

        let _guard = self.lock(dest.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe { ptr::copy_nonoverlapping(src, dest, size) };
    }

    /// Atomically replaces `size` bytes at `target` with `new`, copying the
    /// previous contents into `old`.
    ///
    /// # Safety
    /// `target` must be valid for reads and writes, `new` for reads and `old`
    /// for writes, all of `size` bytes and pairwise non-overlapping. Shared
    /// access rules as for [`AtomicFallback::load_bytes`].
    pub unsafe fn exchange_bytes(
        &self,
        size: usize,
        target: *mut u8,
        new: *const u8,
        old: *mut u8,
        order: MemoryOrder,
    ) {
        return_if_lock_free!(size, target.addr(), |T| unsafe {
            let val = new.cast::<T>().read_unaligned();
            let prev = T::native_swap(target.cast(), val, order.rmw());
            old.cast::<T>().write_unaligned(prev)
        });

        let _guard = self.lock(target.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe {
            ptr::copy_nonoverlapping(target, old, size);
            ptr::copy_nonoverlapping(new, target, size);
        }
    }

    /// If the `size` bytes at `target` equal those at `expected`, replaces them
    /// with `desired` and returns `true`. Otherwise copies the current
    /// contents into `expected` and returns `false`.
    ///
    /// # Safety
    /// `target` and `expected` must be valid for reads and writes, `desired`
    /// for reads, all of `size` bytes and pairwise non-overlapping. Shared
    /// access rules as for [`AtomicFallback::load_bytes`].
    pub unsafe fn compare_exchange_bytes(
        &self,
        size: usize,
        target: *mut u8,
        expected: *mut u8,
        desired: *const u8,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool {
        return_if_lock_free!(size, target.addr(), |T| unsafe {
            let current = expected.cast::<T>().read_unaligned();
            let new = desired.cast::<T>().read_unaligned();
            match T::native_compare_exchange(target.cast(), current, new, success.rmw(), failure.load()) {
                Ok(_) => true,
                Err(actual) => {
                    expected.cast::<T>().write_unaligned(actual);
                    false
                }
            }
        });

        let _guard = self.lock(target.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors
        // of `target` and the caller owns `expected`.
        unsafe {
            let matches = slice::from_raw_parts(target, size) == slice::from_raw_parts(expected, size);
            if matches {
                ptr::copy_nonoverlapping(desired, target, size);
            } else {
                ptr::copy_nonoverlapping(target, expected, size);
            }
            matches
        }
    }

    // -------------------------------------------------------------------------
    // Fixed width
    // -------------------------------------------------------------------------

    /// Atomically reads a `T` from `src`, which may be misaligned.
    ///
    /// # Safety
    /// `src` must be valid for reads of `T`. Shared access rules as for
    /// [`AtomicFallback::load_bytes`].
    #[inline]
    pub unsafe fn load<T: Word>(&self, src: *const T, order: MemoryOrder) -> T {
        if is_lock_free(T::WIDTH, src.addr()) {
            // SAFETY: aligned and native per the predicate; rest forwarded.
            return unsafe { T::native_load(src.cast_mut(), order.load()) };
        }
        let _guard = self.lock(src.addr());
        // SAFETY: forwarded to the caller; the slot excludes other writers.
        unsafe { src.read_unaligned() }
    }

    /// Atomically writes `val` to `dest`, which may be misaligned.
    ///
    /// # Safety
    /// `dest` must be valid for writes of `T`. Shared access rules as for
    /// [`AtomicFallback::load_bytes`].
    #[inline]
    pub unsafe fn store<T: Word>(&self, dest: *mut T, val: T, order: MemoryOrder) {
        if is_lock_free(T::WIDTH, dest.addr()) {
            // SAFETY: aligned and native per the predicate; rest forwarded.
            return unsafe { T::native_store(dest, val, order.store()) };
        }
        let _guard = self.lock(dest.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe { dest.write_unaligned(val) }
    }

    /// Atomically writes `val` to `dest` and returns the previous value.
    ///
    /// # Safety
    /// `dest` must be valid for reads and writes of `T`. Shared access rules
    /// as for [`AtomicFallback::load_bytes`].
    #[inline]
    pub unsafe fn exchange<T: Word>(&self, dest: *mut T, val: T, order: MemoryOrder) -> T {
        if is_lock_free(T::WIDTH, dest.addr()) {
            // SAFETY: aligned and native per the predicate; rest forwarded.
            return unsafe { T::native_swap(dest, val, order.rmw()) };
        }
        let _guard = self.lock(dest.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe {
            let prev = dest.read_unaligned();
            dest.write_unaligned(val);
            prev
        }
    }

    /// Replaces the value at `ptr` with `desired` if it equals `expected`.
    ///
    /// Returns `Ok(previous)` on success and `Err(actual)` on mismatch.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `T`. Shared access rules
    /// as for [`AtomicFallback::load_bytes`].
    #[inline]
    pub unsafe fn compare_exchange<T: Word>(
        &self,
        ptr: *mut T,
        expected: T,
        desired: T,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> Result<T, T> {
        if is_lock_free(T::WIDTH, ptr.addr()) {
            // SAFETY: aligned and native per the predicate; rest forwarded.
            return unsafe { T::native_compare_exchange(ptr, expected, desired, success.rmw(), failure.load()) };
        }
        let _guard = self.lock(ptr.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe {
            let current = ptr.read_unaligned();
            if current == expected {
                ptr.write_unaligned(desired);
                Ok(current)
            } else {
                Err(current)
            }
        }
    }

    /// [`compare_exchange`](Self::compare_exchange) with the expected value
    /// held in a caller buffer, the shape compilers call.
    ///
    /// On mismatch the value actually found is written back to `expected`.
    /// On success `expected` is left untouched. Returns whether the exchange
    /// happened.
    ///
    /// # Safety
    /// As for [`compare_exchange`](Self::compare_exchange), and `expected`
    /// must be valid for reads and writes of `T` (any alignment) and not
    /// accessed concurrently.
    #[inline]
    pub unsafe fn compare_exchange_in_place<T: Word>(
        &self,
        ptr: *mut T,
        expected: *mut T,
        desired: T,
        success: MemoryOrder,
        failure: MemoryOrder,
    ) -> bool {
        // SAFETY: `expected` is private to the caller and valid per contract.
        let current = unsafe { expected.read_unaligned() };
        // SAFETY: forwarded to the caller.
        match unsafe { self.compare_exchange(ptr, current, desired, success, failure) } {
            Ok(_) => true,
            Err(actual) => {
                // SAFETY: as for the read above.
                unsafe { expected.write_unaligned(actual) };
                false
            }
        }
    }

    /// Atomically replaces the value at `ptr` with `current <op> operand` and
    /// returns `current`.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `T`. Shared access rules
    /// as for [`AtomicFallback::load_bytes`].
    #[inline]
    pub unsafe fn fetch_op<T: Word>(&self, ptr: *mut T, op: RmwOp, operand: T, order: MemoryOrder) -> T {
        if is_lock_free(T::WIDTH, ptr.addr()) {
            // SAFETY: aligned and native per the predicate; rest forwarded.
            return unsafe { T::native_fetch(ptr, op, operand, order.rmw()) };
        }
        let _guard = self.lock(ptr.addr());
        // SAFETY: forwarded to the caller; the slot excludes other accessors.
        unsafe {
            let current = ptr.read_unaligned();
            ptr.write_unaligned(op.apply(current, operand));
            current
        }
    }

    /// Wrapping add; returns the previous value.
    ///
    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_add<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::Add, operand, order) }
    }

    /// Wrapping subtract; returns the previous value.
    ///
    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_sub<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::Sub, operand, order) }
    }

    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_and<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::And, operand, order) }
    }

    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_or<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::Or, operand, order) }
    }

    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_xor<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::Xor, operand, order) }
    }

    /// Stores `!(current & operand)`; returns the previous value.
    ///
    /// # Safety
    /// As for [`AtomicFallback::fetch_op`].
    #[inline]
    pub unsafe fn fetch_nand<T: Word>(&self, ptr: *mut T, operand: T, order: MemoryOrder) -> T {
        unsafe { self.fetch_op(ptr, RmwOp::Nand, operand, order) }
    }
}

impl<I: IrqControl, const N: usize, R: RelaxStrategy> Default for AtomicFallback<I, N, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::HostedIrq;

    #[repr(C, align(16))]
    struct Aligned([u8; 32]);

    #[test]
    fn unaligned_value_buffers_on_the_native_path() {
        let atomics: AtomicFallback<HostedIrq, 16> = AtomicFallback::new();
        let mut target = 0u32;
        let mut scratch = Aligned([0; 32]);
        let new = &mut scratch.0[1..5];
        new.copy_from_slice(&0x1122_3344u32.to_ne_bytes());
        let new_ptr = new.as_ptr();
        let mut old = [0xffu8; 5];

        unsafe {
            atomics.exchange_bytes(
                4,
                (&raw mut target).cast(),
                new_ptr,
                old.as_mut_ptr().add(1),
                MemoryOrder::AcqRel,
            );
        }
        assert_eq!(target, 0x1122_3344);
        assert_eq!(&old[1..], &0u32.to_ne_bytes());
    }

    #[test]
    fn lock_free_query_does_not_touch_the_table() {
        let atomics: AtomicFallback<HostedIrq, 16> = AtomicFallback::default();
        assert!(!atomics.is_lock_free(3, 0));
        assert!(!atomics.is_lock_free(16, 0));
        assert_eq!(atomics.is_lock_free(4, 0x100), Widths::NATIVE.contains(Widths::W4));
        assert_eq!(atomics.table().len(), 16);
    }
}
