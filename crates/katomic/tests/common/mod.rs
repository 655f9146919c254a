//! Shared test fixtures: an instrumented interrupt controller and raw
//! buffers that can hold misaligned values.

#![allow(dead_code)]

use std::cell::{Cell, UnsafeCell};

use katomic::IrqControl;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static SAVES: Cell<usize> = const { Cell::new(0) };
    static RESTORES: Cell<usize> = const { Cell::new(0) };
}

/// Interrupt control that counts saves and restores on the current thread.
///
/// Every slot acquisition saves exactly once and every release restores
/// exactly once, so the counters measure slot traffic. The token is the
/// nesting depth before the save, and restore checks it comes back in order.
pub struct CountingIrq;

impl IrqControl for CountingIrq {
    type Token = usize;

    fn save_and_disable() -> usize {
        SAVES.with(|saves| saves.set(saves.get() + 1));
        DEPTH.with(|depth| {
            let prev = depth.get();
            depth.set(prev + 1);
            prev
        })
    }

    unsafe fn restore(token: usize) {
        RESTORES.with(|restores| restores.set(restores.get() + 1));
        DEPTH.with(|depth| {
            assert_eq!(depth.get(), token + 1, "interrupt state restored out of order");
            depth.set(token);
        });
    }
}

/// `(saves, restores)` on this thread since the last [`reset`].
pub fn slot_traffic() -> (usize, usize) {
    (SAVES.with(Cell::get), RESTORES.with(Cell::get))
}

/// Current interrupt-disable nesting depth on this thread.
pub fn irq_depth() -> usize {
    DEPTH.with(Cell::get)
}

pub fn reset() {
    SAVES.with(|c| c.set(0));
    RESTORES.with(|c| c.set(0));
}

/// 16-byte aligned scratch memory, shareable between test threads.
///
/// Offsets into it give precise control over alignment.
#[repr(C, align(16))]
pub struct Buffer(UnsafeCell<[u8; 128]>);

// SAFETY: every concurrent access in the tests goes through the fallback.
unsafe impl Sync for Buffer {}

impl Buffer {
    pub const fn new() -> Self {
        Self(UnsafeCell::new([0; 128]))
    }

    pub fn at(&self, offset: usize) -> *mut u8 {
        assert!(offset < 128);
        // SAFETY: in bounds per the assertion.
        unsafe { self.0.get().cast::<u8>().add(offset) }
    }

    pub fn word<T>(&self, offset: usize) -> *mut T {
        assert!(offset + size_of::<T>() <= 128);
        self.at(offset).cast()
    }
}
