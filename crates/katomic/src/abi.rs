// =============================================================================
// katomic — `__atomic_*` Runtime Entry Points
// =============================================================================
//
// These are the symbols the compiler calls when it cannot emit an inline
// atomic: the generic (runtime-size) family and the fixed-width families for
// 1/2/4/8 bytes. All of them share one process-wide table, so a call from
// C and a call from Rust on the same address contend on the same slot.
//
// Only exported on 32-bit pointer targets. 64-bit targets have native atomics
// for every width the compiler would otherwise route here. There are no
// `_16` symbols: 32-bit C has no `__int128`, so 16-byte objects arrive through
// the generic family. The Rust API still takes `u128`.
//
// Host test builds compile the same bodies unexported, over `HostedIrq`.
//
// Memory orders arrive as raw C11 integers; an unknown value is treated as
// SeqCst.
//
// =============================================================================

use crate::dispatch::AtomicFallback;
use crate::lock_free::is_lock_free;
use crate::order::MemoryOrder;
use crate::word::RmwOp;

#[cfg(all(feature = "extern-irq", not(test)))]
type Irq = crate::irq::ExternIrq;
#[cfg(not(all(feature = "extern-irq", not(test))))]
type Irq = crate::irq::HostedIrq;

/// The process-wide fallback. All slots start unlocked; never torn down.
static ATOMICS: AtomicFallback<Irq> = AtomicFallback::new();

#[inline(always)]
fn order(model: i32) -> MemoryOrder {
    MemoryOrder::from_raw_or_seq_cst(model)
}

#[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
pub extern "C" fn __atomic_is_lock_free(size: usize, ptr: *const u8) -> bool {
    is_lock_free(size, ptr.addr())
}

#[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn __atomic_load(size: usize, src: *const u8, dest: *mut u8, model: i32) {
    // SAFETY: the compiler passes `size`-byte objects at `src` and `dest`,
    // the contract of `load_bytes`.
    unsafe { ATOMICS.load_bytes(size, src, dest, order(model)) }
}

#[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn __atomic_store(size: usize, dest: *mut u8, src: *const u8, model: i32) {
    // SAFETY: `size`-byte objects at `dest` and `src`, as `store_bytes` needs.
    unsafe { ATOMICS.store_bytes(size, dest, src, order(model)) }
}

#[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn __atomic_exchange(size: usize, ptr: *mut u8, val: *const u8, old: *mut u8, model: i32) {
    // SAFETY: `size`-byte objects at all three pointers; `old` is the
    // caller's private buffer.
    unsafe { ATOMICS.exchange_bytes(size, ptr, val, old, order(model)) }
}

#[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn __atomic_compare_exchange(
    size: usize,
    ptr: *mut u8,
    expected: *mut u8,
    desired: *const u8,
    success: i32,
    failure: i32,
) -> bool {
    // SAFETY: `size`-byte objects at all three pointers; `expected` is the
    // caller's private buffer.
    unsafe { ATOMICS.compare_exchange_bytes(size, ptr, expected, desired, order(success), order(failure)) }
}

/// Load/store/exchange/compare-exchange for one fixed width.
macro_rules! sized_entry_points {
    ($t:ty => $load:ident, $store:ident, $exchange:ident, $compare_exchange:ident) => {
        #[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
        pub unsafe extern "C" fn $load(src: *const $t, model: i32) -> $t {
            // SAFETY: the compiler only emits this call on a valid `src`.
            unsafe { ATOMICS.load(src, order(model)) }
        }

        #[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
        pub unsafe extern "C" fn $store(dest: *mut $t, val: $t, model: i32) {
            // SAFETY: as for the load; `dest` is writable.
            unsafe { ATOMICS.store(dest, val, order(model)) }
        }

        #[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
        pub unsafe extern "C" fn $exchange(dest: *mut $t, val: $t, model: i32) -> $t {
            // SAFETY: as for the store.
            unsafe { ATOMICS.exchange(dest, val, order(model)) }
        }

        #[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
        pub unsafe extern "C" fn $compare_exchange(
            ptr: *mut $t,
            expected: *mut $t,
            desired: $t,
            success: i32,
            failure: i32,
        ) -> bool {
            // SAFETY: `ptr` is the shared object, `expected` the caller's
            // private copy; both valid for reads and writes.
            unsafe { ATOMICS.compare_exchange_in_place(ptr, expected, desired, order(success), order(failure)) }
        }
    };
}

/// The six fetch-and-op entry points for one fixed width.
macro_rules! rmw_entry_points {
    ($t:ty => $($name:ident: $op:ident),+ $(,)?) => {
        $(
            #[cfg_attr(all(feature = "abi", target_pointer_width = "32", not(test)), unsafe(no_mangle))]
            pub unsafe extern "C" fn $name(ptr: *mut $t, val: $t, model: i32) -> $t {
                // SAFETY: `ptr` is valid for reads and writes, per the caller.
                unsafe { ATOMICS.fetch_op(ptr, RmwOp::$op, val, order(model)) }
            }
        )+
    };
}

sized_entry_points!(u8 => __atomic_load_1, __atomic_store_1, __atomic_exchange_1, __atomic_compare_exchange_1);
sized_entry_points!(u16 => __atomic_load_2, __atomic_store_2, __atomic_exchange_2, __atomic_compare_exchange_2);
sized_entry_points!(u32 => __atomic_load_4, __atomic_store_4, __atomic_exchange_4, __atomic_compare_exchange_4);
sized_entry_points!(u64 => __atomic_load_8, __atomic_store_8, __atomic_exchange_8, __atomic_compare_exchange_8);

rmw_entry_points!(u8 =>
    __atomic_fetch_add_1: Add,
    __atomic_fetch_sub_1: Sub,
    __atomic_fetch_and_1: And,
    __atomic_fetch_or_1: Or,
    __atomic_fetch_xor_1: Xor,
    __atomic_fetch_nand_1: Nand,
);
rmw_entry_points!(u16 =>
    __atomic_fetch_add_2: Add,
    __atomic_fetch_sub_2: Sub,
    __atomic_fetch_and_2: And,
    __atomic_fetch_or_2: Or,
    __atomic_fetch_xor_2: Xor,
    __atomic_fetch_nand_2: Nand,
);
rmw_entry_points!(u32 =>
    __atomic_fetch_add_4: Add,
    __atomic_fetch_sub_4: Sub,
    __atomic_fetch_and_4: And,
    __atomic_fetch_or_4: Or,
    __atomic_fetch_xor_4: Xor,
    __atomic_fetch_nand_4: Nand,
);
rmw_entry_points!(u64 =>
    __atomic_fetch_add_8: Add,
    __atomic_fetch_sub_8: Sub,
    __atomic_fetch_and_8: And,
    __atomic_fetch_or_8: Or,
    __atomic_fetch_xor_8: Xor,
    __atomic_fetch_nand_8: Nand,
);
