// =============================================================================
// katomic — Atomic Operations on Arbitrary Memory
// =============================================================================
//
// The compiler lowers a language-level atomic to a native instruction only
// when it can prove the object's size and alignment are supported by the
// hardware. Everything else (odd-sized structs, misaligned fields, 64-bit
// values on a core without 64-bit atomics) becomes a call into this library.
//
// HOW IT WORKS:
//   - A fixed, static table of spin slots (1024 by default).
//   - Each address hashes to one slot. Many unrelated addresses share a
//     slot; that only costs contention, never correctness, because each
//     critical section touches only its own target.
//   - For every operation we ask one question first: "is this size at this
//     alignment natively lock-free?" If yes, use the native instruction.
//     If no, take the slot, do a plain copy/compare/modify, release.
//
// THE CENTRAL INVARIANT:
//   Every accessor of an address must agree on whether it needs a slot.
//   The compiler's own inline atomics never take a slot, so the predicate
//   here must match the compiler's: a pure function of (size, alignment).
//
// INTERRUPTS:
//   A slot is held with local interrupts disabled. An interrupt handler that
//   hits the same slot on the same core would otherwise spin forever waiting
//   for the code it interrupted. How interrupts are masked is injected
//   through `IrqControl`, so the crate runs inside a kernel and on a hosted
//   target alike.
//
// LAYOUT:
//   irq         — interrupt save/disable/restore capability
//   lock_table  — slots, the address hash, RAII slot guards
//   lock_free   — native width set and the lock-freedom predicate
//   order       — C11 memory-order model and its mapping to `Ordering`
//   word        — fixed-width integer abstraction and RMW operators
//   dispatch    — `AtomicFallback`: generic-size and fixed-width operations
//   stats       — optional acquisition/contention counters
//   abi         — `__atomic_*` C entry points (feature `abi`, 32-bit only)
//
// =============================================================================

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(not(target_has_atomic = "ptr"))]
compile_error!("katomic requires lock-free pointer-size compare-and-swap for its slots");

pub mod dispatch;
pub mod irq;
pub mod lock_free;
pub mod lock_table;
pub mod order;
#[cfg(feature = "stats")]
pub mod stats;
pub mod word;

#[cfg(any(test, all(feature = "abi", target_pointer_width = "32")))]
mod abi;

pub use dispatch::AtomicFallback;
pub use irq::{HostedIrq, IrqControl};
pub use lock_free::{Widths, is_lock_free};
pub use lock_table::{LockTable, SLOT_COUNT, Slot, SlotGuard, slot_index};
pub use order::{InvalidMemoryOrder, MemoryOrder};
pub use word::{RmwOp, Word};

#[cfg(feature = "extern-irq")]
pub use irq::ExternIrq;
#[cfg(all(feature = "x86-irq", target_arch = "x86_64"))]
pub use irq::X86Irq;
#[cfg(feature = "stats")]
pub use stats::StatsSnapshot;
