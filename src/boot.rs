//! Cold boot
//!
//! The reset vector lands in a naked trampoline that owns no stack and
//! trusts no register. It gives IRQ mode its own stack at the top of the
//! linker's `_estack`, returns to supervisor mode with `sp` just below that,
//! clears `r0`/`r1` and branches to [`simrt_reset`]. That routine relocates
//! `.data`, clears `.bss` and calls the application's `main`. If `main`
//! returns the core stops.
//!
//! ```text
//!   _estack ──────────────┐
//!             IRQ stack   │ IRQ_STACK_SIZE
//!   svc top ──────────────┤
//!             SVC stack   │ grows down
//! ```
//!
//! Nothing here can fail recoverably; there is no one to report to yet.

/// Bytes reserved for the IRQ-mode stack at the top of `_estack`
pub const IRQ_STACK_SIZE: usize = 1024;

/// CPSR mode field values used at reset
pub mod mode {
    pub const IRQ: u32 = 0x12;
    pub const SVC: u32 = 0x13;
}

/// Stack tops for the two modes the runtime executes in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    /// Initial `sp` in IRQ mode
    pub irq_top: usize,
    /// Initial `sp` in supervisor mode
    pub svc_top: usize,
}

impl StackLayout {
    /// Split the stack region ending at `estack`.
    pub const fn carve(estack: usize) -> Self {
        Self {
            irq_top: estack,
            svc_top: estack - IRQ_STACK_SIZE,
        }
    }
}

/// Copy the initialised-data image from its load address to its run address.
///
/// Copies word by word until `run_end` is reached; an empty region copies
/// nothing.
///
/// # Safety
/// `run_start..run_end` must be a writable, word-aligned region and
/// `load` must point at at least as many readable words. The regions must
/// not overlap unless they are identical.
pub unsafe fn init_data(load: *const u32, run_start: *mut u32, run_end: *mut u32) {
    let mut src = load;
    let mut dst = run_start;
    while dst < run_end {
        // SAFETY: both cursors stay inside the regions the caller vouched for.
        // Volatile keeps the loop from being lowered to a memcpy call that
        // may itself live in .data.
        unsafe {
            core::ptr::write_volatile(dst, core::ptr::read_volatile(src));
            src = src.add(1);
            dst = dst.add(1);
        }
    }
}

/// Zero the uninitialised-data region word by word.
///
/// # Safety
/// `start..end` must be a writable, word-aligned region.
pub unsafe fn zero_bss(start: *mut u32, end: *mut u32) {
    let mut dst = start;
    while dst < end {
        // SAFETY: dst stays inside the region the caller vouched for
        unsafe {
            core::ptr::write_volatile(dst, 0);
            dst = dst.add(1);
        }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod reset {
    use core::arch::global_asm;
    use core::ptr::{addr_of, addr_of_mut};

    extern "C" {
        static _estack: u32;
        static _sidata: u32;
        static mut _sdata: u32;
        static mut _edata: u32;
        static mut _sbss: u32;
        static mut _ebss: u32;

        fn Reset_Handler() -> !;

        /// Application entry point
        fn main() -> i32;
    }

    // Entered from the reset vector in ARM state, supervisor mode, IRQs
    // masked, with no usable stack. IRQ mode has a banked `sp` that must be
    // set before IRQs are ever unmasked. `bx` so a Thumb runtime is reached
    // correctly.
    global_asm!(
        ".section .text.Reset_Handler, \"ax\", %progbits",
        ".arm",
        ".align 2",
        ".global Reset_Handler",
        ".type Reset_Handler, %function",
        "Reset_Handler:",
        "    ldr   r2, =_estack",
        "    cps   #{irq_mode}",
        "    mov   sp, r2",
        "    cps   #{svc_mode}",
        "    sub   sp, r2, #{irq_size}",
        "    mov   r0, #0",
        "    mov   r1, #0",
        "    ldr   r3, =simrt_reset",
        "    bx    r3",
        ".size Reset_Handler, . - Reset_Handler",
        irq_mode = const super::mode::IRQ,
        svc_mode = const super::mode::SVC,
        irq_size = const super::IRQ_STACK_SIZE,
    );

    /// Runtime half of the reset sequence
    ///
    /// Relocates `.data`, clears `.bss`, then runs the application's `main`.
    /// Stops the core if `main` returns.
    ///
    /// # Safety
    /// - Must be entered exactly once, from `Reset_Handler`, before any other
    ///   Rust code has run
    /// - Both mode stacks must already be set up; this routine itself uses
    ///   the supervisor stack
    /// - The linker script must place `_sidata`, `_sdata`/`_edata` and
    ///   `_sbss`/`_ebss` on word boundaries, with the `.data` load image at
    ///   least as long as its run region
    /// - No statics may be read before this returns control to `main`:
    ///   their contents are undefined until the copy and clear finish
    #[no_mangle]
    pub unsafe extern "C" fn simrt_reset() -> ! {
        // SAFETY:
        // - The markers bound word-aligned .data and .bss, per the linker
        //   script contract above
        // - The load image lives in ROM and does not overlap the run region
        // - Nothing has touched either region yet, and no other context
        //   exists while IRQs are masked from reset
        unsafe {
            super::init_data(addr_of!(_sidata), addr_of_mut!(_sdata), addr_of_mut!(_edata));
            super::zero_bss(addr_of_mut!(_sbss), addr_of_mut!(_ebss));
            main();
        }

        crate::halt();
    }

    /// Address of the reset trampoline
    pub fn entry() -> usize {
        Reset_Handler as usize
    }

    /// Initial supervisor-mode stack pointer, below the IRQ stack
    pub fn stack_top() -> usize {
        // SAFETY: only the symbol's address is taken
        let estack = unsafe { addr_of!(_estack) as usize };
        super::StackLayout::carve(estack).svc_top
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use reset::{entry, simrt_reset, stack_top};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn relocate(image: &[u32], bss_words: usize) -> (Vec<u32>, Vec<u32>) {
        let mut data = vec![0xA5A5_A5A5u32; image.len()];
        let mut bss = vec![0xDEAD_BEEFu32; bss_words];
        let data_range = data.as_mut_ptr_range();
        let bss_range = bss.as_mut_ptr_range();
        // SAFETY: ranges come from live, distinct vectors
        unsafe {
            init_data(image.as_ptr(), data_range.start, data_range.end);
            zero_bss(bss_range.start, bss_range.end);
        }
        (data, bss)
    }

    #[test]
    fn test_irq_stack_carved_below_estack() {
        let layout = StackLayout::carve(0x2000_8000);
        assert_eq!(layout.irq_top, 0x2000_8000);
        assert_eq!(layout.svc_top, 0x2000_8000 - IRQ_STACK_SIZE);
        assert_ne!(layout.irq_top, layout.svc_top);
        // AAPCS wants 8-byte aligned stack tops in both modes.
        assert_eq!(layout.svc_top % 8, 0);
    }

    // Room for the IRQ stub's six saved words plus the Rust entry.
    static_assertions::const_assert!(IRQ_STACK_SIZE >= 6 * 4 + 256);

    #[test]
    fn test_mode_field_values() {
        assert_eq!(mode::IRQ, 0b1_0010);
        assert_eq!(mode::SVC, 0b1_0011);
    }

    #[test]
    fn test_empty_regions() {
        let (data, bss) = relocate(&[], 0);
        assert!(data.is_empty());
        assert!(bss.is_empty());
    }

    #[test]
    fn test_copy_stops_at_run_end() {
        let image = [1u32, 2, 3, 4];
        let mut run = [0u32; 6];
        // SAFETY: copy three words into a six-word buffer
        unsafe {
            let start = run.as_mut_ptr();
            init_data(image.as_ptr(), start, start.add(3));
        }
        assert_eq!(run, [1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_zero_stops_at_end() {
        let mut bss = [7u32; 5];
        // SAFETY: clear the middle three words
        unsafe {
            let start = bss.as_mut_ptr();
            zero_bss(start.add(1), start.add(4));
        }
        assert_eq!(bss, [7, 0, 0, 0, 7]);
    }

    proptest! {
        #[test]
        fn prop_layout_after_boot(
            image in proptest::collection::vec(any::<u32>(), 0..256),
            bss_words in 0usize..256,
        ) {
            let (data, bss) = relocate(&image, bss_words);
            prop_assert_eq!(&data, &image);
            prop_assert!(bss.iter().all(|&w| w == 0));
            prop_assert_eq!(bss.len(), bss_words);
        }
    }
}
