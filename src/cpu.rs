//! Processor state helpers
//!
//! IRQ masking through CPSR.I and the idle primitives. Off-target builds get
//! inert versions so the code above them can run under test.

/// CPSR.I, IRQs masked when set
#[cfg(target_arch = "arm")]
const CPSR_I: u32 = 1 << 7;

/// Saved IRQ mask state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqState {
    was_masked: bool,
}

impl IrqState {
    pub const fn was_masked(self) -> bool {
        self.was_masked
    }
}

/// Mask IRQs, returning the previous state.
#[cfg(target_arch = "arm")]
#[inline]
pub fn mask_irqs() -> IrqState {
    let cpsr: u32;
    // SAFETY: reading CPSR and setting the I bit have no memory effects
    unsafe {
        core::arch::asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack, preserves_flags));
        core::arch::asm!("cpsid i", options(nostack, preserves_flags));
    }
    IrqState {
        was_masked: cpsr & CPSR_I != 0,
    }
}

#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn mask_irqs() -> IrqState {
    IrqState { was_masked: true }
}

/// Put back the mask state saved by [`mask_irqs`].
#[inline]
pub fn restore_irqs(state: IrqState) {
    if !state.was_masked {
        unmask_irqs();
    }
}

/// Let the processor take IRQs.
#[cfg(target_arch = "arm")]
#[inline]
pub fn unmask_irqs() {
    // SAFETY: clears CPSR.I; handlers reached from the IRQ vector are installed
    unsafe {
        core::arch::asm!("cpsie i", options(nostack, preserves_flags));
    }
}

#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn unmask_irqs() {}

/// Wait without sleeping the core.
///
/// The runtime avoids `wfi` so the single execution context stays
/// observable under a debugger.
#[inline]
pub fn idle() {
    #[cfg(target_arch = "arm")]
    // SAFETY: nop has no effects
    unsafe {
        core::arch::asm!("nop", options(nomem, nostack, preserves_flags));
    }
    core::hint::spin_loop();
}
