// =============================================================================
// katomic — Interrupt State Control
// =============================================================================
//
// A slot must never be re-acquired on the core that already holds it, or the
// core spins forever against itself. The only way that can happen is an
// interrupt handler (or anything else that preempts the holder) performing a
// fallback atomic on an address hashing to the same slot. So interrupts are
// masked BEFORE the spin loop starts and stay masked until the slot is
// released.
//
// The previous state is captured as an opaque token and handed back on
// release. Restoring the token (not blindly re-enabling) is what makes
// nesting work: if the caller already had interrupts off, they stay off.
//
// =============================================================================

/// Capability to enter and leave a non-preemptible section on the current
/// execution context.
///
/// Implementations are stateless; the state lives in the returned token.
pub trait IrqControl {
    /// Whatever must be handed back to [`IrqControl::restore`].
    type Token: Copy;

    /// Disables local interrupt delivery and returns the prior state.
    fn save_and_disable() -> Self::Token;

    /// Restores the state captured by the matching `save_and_disable`.
    ///
    /// # Safety
    /// `token` must come from `save_and_disable` on this same execution
    /// context, be restored exactly once, and be restored in LIFO order with
    /// respect to any other saved tokens.
    unsafe fn restore(token: Self::Token);
}

/// No-op interrupt control for hosted targets.
///
/// Sound only where nothing can preempt a slot holder and re-enter the
/// fallback on the same thread (ordinary user-space threads, tests). Signal
/// handlers that use fallback atomics break this assumption.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostedIrq;

impl IrqControl for HostedIrq {
    type Token = ();

    #[inline(always)]
    fn save_and_disable() {}

    #[inline(always)]
    unsafe fn restore(_token: ()) {}
}

#[cfg(feature = "extern-irq")]
unsafe extern "C" {
    fn disable_local_irq_save() -> usize;
    fn enable_local_irq_restore(old: usize);
}

/// Interrupt primitives supplied by the host kernel.
///
/// The kernel must export `disable_local_irq_save() -> usize` and
/// `enable_local_irq_restore(usize)` with the C ABI.
#[cfg(feature = "extern-irq")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternIrq;

#[cfg(feature = "extern-irq")]
impl IrqControl for ExternIrq {
    type Token = usize;

    #[inline]
    fn save_and_disable() -> usize {
        // SAFETY: the host kernel guarantees these symbols are callable from
        // any context; saving the state has no preconditions.
        unsafe { disable_local_irq_save() }
    }

    #[inline]
    unsafe fn restore(token: usize) {
        // SAFETY: forwarded to the caller (token came from save_and_disable).
        unsafe { enable_local_irq_restore(token) }
    }
}

/// Interrupt control through the x86_64 RFLAGS.IF bit.
///
/// The token records whether IF was set; restore only executes STI if it
/// was, so nested sections never re-enable interrupts early.
#[cfg(all(feature = "x86-irq", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct X86Irq;

#[cfg(all(feature = "x86-irq", target_arch = "x86_64"))]
impl IrqControl for X86Irq {
    type Token = bool;

    #[inline(always)]
    fn save_and_disable() -> bool {
        use x86_64::instructions::interrupts;

        let were_enabled = interrupts::are_enabled();
        interrupts::disable();
        were_enabled
    }

    #[inline(always)]
    unsafe fn restore(were_enabled: bool) {
        if were_enabled {
            x86_64::instructions::interrupts::enable();
        }
    }
}
