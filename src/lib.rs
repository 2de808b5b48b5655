//! simrt - bare-metal runtime for simulated ARM cores
//!
//! Boots a single AArch32 core under gem5, brings up the GICv2, routes
//! interrupts through a vector table to registered handlers, and gives
//! C and Rust code console, file and exit services through ARM
//! semihosting.
//!
//! # Layout
//! - [`boot`]: reset trampoline, `.data`/`.bss` setup
//! - [`exception`]: CPU exception vectors and the IRQ entry
//! - [`vectors`]: the interrupt vector table handlers register in
//! - [`gic`] and [`dispatch`]: controller bring-up and the dispatch cycle
//! - [`semihosting`]: the host trap and the calls built on it
//! - [`posix`]: C-convention shims and, with `newlib`, the libc hooks
//! - [`bridge`]: the bridge I/O window and the sample avoidance handler
//!
//! # Targets
//! Hardware paths only exist on `target_arch = "arm"`. Everything else is
//! written against the [`mmio::Bus`] and [`semihosting::Gateway`] seams and
//! runs on a development host under test.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod boot;
pub mod bridge;
pub mod config;
pub mod console;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod gic;
pub mod logger;
pub mod mmio;
pub mod posix;
pub mod semihosting;
pub mod vectors;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Errno, Error, Result};

/// Stop the core for good.
///
/// Spins instead of `wfi` so a debugger attached to the simulator still
/// sees a live core.
pub fn halt() -> ! {
    loop {
        cpu::idle();
    }
}
