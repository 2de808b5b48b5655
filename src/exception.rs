//! AArch32 exception vectors
//!
//! The CPU vector table is eight branch instructions in `.vectors`:
//!
//! | Offset | Exception        | Target                     |
//! |--------|------------------|----------------------------|
//! | 0x00   | Reset            | `Reset_Handler` (boot)     |
//! | 0x04   | Undefined        | weak, default handler      |
//! | 0x08   | SWI              | weak, default handler      |
//! | 0x0C   | Prefetch abort   | weak, default handler      |
//! | 0x10   | Data abort       | weak, default handler      |
//! | 0x14   | Reserved         | weak, default handler      |
//! | 0x18   | IRQ              | `IRQ_Handler` stub         |
//! | 0x1C   | FIQ              | weak, default handler      |
//!
//! The IRQ stub saves the caller-saved registers, calls
//! [`simrt_irq_entry`] and returns with `subs pc, lr, #4`. The entry
//! hands the cycle to whatever dispatcher was installed with [`install`].
//!
//! Weak labels can be overridden by strong symbols elsewhere in the image.

use spin::Once;

use crate::dispatch::{Dispatch, Masked};

/// Registers saved by the IRQ stub, lowest address first
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IrqFrame {
    /// r0-r3
    pub r: [u32; 4],
    pub r12: u32,
    /// Return address plus 4
    pub lr: u32,
}

static DISPATCHER: Once<&'static dyn Dispatch> = Once::new();

/// Route IRQ vector entries to `dispatcher`. Only the first call has effect.
pub fn install(dispatcher: &'static dyn Dispatch) {
    DISPATCHER.call_once(|| dispatcher);
}

/// Serve one IRQ vector entry.
///
/// An IRQ with no dispatcher installed cannot be acknowledged and would
/// re-fire forever, so the core stops instead.
pub fn serve_irq(dispatcher: Option<&dyn Dispatch>, masked: &Masked) {
    match dispatcher {
        Some(dispatcher) => {
            dispatcher.dispatch(masked);
        }
        None => crate::halt(),
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod vectors {
    use core::arch::global_asm;

    global_asm!(
        ".section .vectors, \"ax\", %progbits",
        ".arm",
        ".align 5",
        ".global _vectors_start",
        "_vectors_start:",
        "    b Reset_Handler",
        "    b Undefined_Handler",
        "    b SWI_Handler",
        "    b PrefetchAbort_Handler",
        "    b DataAbort_Handler",
        "    b Reserved_Handler",
        "    b IRQ_Handler",
        "    b FIQ_Handler",
        "",
        ".text",
        ".arm",
        ".align 2",
        ".global IRQ_Handler",
        ".type IRQ_Handler, %function",
        "IRQ_Handler:",
        "    stmfd sp!, {{r0-r3, r12, lr}}",
        "    mov   r0, sp",
        "    ldr   r3, =simrt_irq_entry",
        "    blx   r3",
        "    ldmfd sp!, {{r0-r3, r12, lr}}",
        "    subs  pc, lr, #4",
        ".size IRQ_Handler, . - IRQ_Handler",
        "",
        ".weak Undefined_Handler",
        ".weak SWI_Handler",
        ".weak PrefetchAbort_Handler",
        ".weak DataAbort_Handler",
        ".weak Reserved_Handler",
        ".weak FIQ_Handler",
        "Undefined_Handler:",
        "SWI_Handler:",
        "PrefetchAbort_Handler:",
        "DataAbort_Handler:",
        "Reserved_Handler:",
        "FIQ_Handler:",
        "    ldr   r3, =simrt_default_handler",
        "    bx    r3",
    );

    /// Target of every exception nobody claimed
    #[no_mangle]
    pub extern "C" fn simrt_default_handler() -> ! {
        crate::halt();
    }

    /// Rust side of the IRQ stub
    #[no_mangle]
    pub extern "C" fn simrt_irq_entry(frame: &super::IrqFrame) {
        log::trace!("irq: entry, return to {:#x}", frame.lr.wrapping_sub(4));
        // SAFETY: the core masks IRQs on entry to IRQ mode and the stub does
        // not unmask them before returning
        let masked = unsafe { crate::dispatch::Masked::assume() };
        super::serve_irq(super::DISPATCHER.get().copied(), &masked);
    }
}

/// Point `VBAR` at the vector table.
///
/// Must be called once during start of day, before IRQs can be unmasked.
///
/// # Safety
/// Safe to call, but it relies on the following holding at start of day:
/// - The core runs in a privileged mode (supervisor after reset), the only
///   modes that may write `VBAR`
/// - IRQ mode already has its own stack, set by the reset trampoline, since
///   the IRQ stub pushes onto it
/// - The `.vectors` section is linked into executable memory; `.align 5`
///   gives the 32-byte alignment `VBAR` requires
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn init() {
    extern "C" {
        static _vectors_start: u8;
    }

    // SAFETY:
    // - Only the address of _vectors_start is taken, never its contents
    // - The table is 32-byte aligned and holds eight valid branches
    // - Writing VBAR from a privileged mode has no other side effect; the
    //   isb makes the new base visible before any exception can be taken
    unsafe {
        let base = core::ptr::addr_of!(_vectors_start) as u32;
        core::arch::asm!(
            "mcr p15, 0, {v}, c12, c0, 0",
            "isb",
            v = in(reg) base,
            options(nostack, preserves_flags)
        );
    }

    log::info!("exception: vectors installed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gic::Ack;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting(AtomicU32);

    impl Dispatch for Counting {
        fn dispatch(&self, _masked: &Masked) -> Option<Ack> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[test]
    fn test_irq_entry_forwards_to_dispatcher() {
        let counting = Counting(AtomicU32::new(0));
        let masked = unsafe { Masked::assume() };
        serve_irq(Some(&counting), &masked);
        serve_irq(Some(&counting), &masked);
        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_frame_layout() {
        static_assertions::assert_eq_size!(IrqFrame, [u32; 6]);
        assert_eq!(core::mem::offset_of!(IrqFrame, lr), 20);
    }
}
