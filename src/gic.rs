//! GICv2 interrupt controller
//!
//! Only the handful of registers the runtime needs: the distributor's
//! enable-set words and global enable, and the CPU interface's priority
//! mask, enable, acknowledge and end-of-interrupt registers.

use core::hint::spin_loop;

use crate::config::Config;
use crate::mmio::Bus;

/// Distributor register offsets
mod gicd {
    /// Distributor control
    pub const CTLR: usize = 0x000;
    /// Interrupt set-enable words, 32 lines each
    pub const ISENABLER: usize = 0x100;
}

/// CPU interface register offsets
mod gicc {
    /// CPU interface control
    pub const CTLR: usize = 0x00;
    /// Priority mask
    pub const PMR: usize = 0x04;
    /// Interrupt acknowledge
    pub const IAR: usize = 0x0C;
    /// End of interrupt
    pub const EOIR: usize = 0x10;
}

/// INTID field of an acknowledge token
const ID_MASK: u32 = 0x3FF;

/// INTID reported when nothing is pending
pub const SPURIOUS: u32 = 0x3FF;

/// An acknowledge token as read from `GICC_IAR`
///
/// The controller ties priority state to the whole token, so the value
/// written back at end-of-interrupt is always this one, never a rebuilt ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ack(u32);

impl Ack {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Interrupt ID, bits [9:0]
    #[inline]
    pub const fn id(self) -> u32 {
        self.0 & ID_MASK
    }

    #[inline]
    pub const fn is_spurious(self) -> bool {
        self.id() == SPURIOUS
    }
}

/// The acknowledge / end-of-interrupt pair a dispatcher drives
pub trait InterruptController {
    /// Read the acknowledge register.
    fn acknowledge(&self) -> Ack;

    /// Complete the interrupt identified by `ack`.
    fn end_of_interrupt(&self, ack: Ack);
}

/// A GICv2 behind a register bus
pub struct Gic<B> {
    bus: B,
    dist_base: usize,
    cpu_base: usize,
}

impl<B: Bus> Gic<B> {
    pub const fn new(bus: B, dist_base: usize, cpu_base: usize) -> Self {
        Self {
            bus,
            dist_base,
            cpu_base,
        }
    }

    /// One-time start-of-day setup.
    ///
    /// Enables every line in the first `config.enable_words` enable words
    /// rather than discovering which SPI the platform wired up, lets the
    /// writes settle, and only then enables the distributor. The CPU
    /// interface is opened last. `ITARGETSR` is left alone.
    ///
    /// Processor IRQs are not unmasked here.
    pub fn bring_up(&self, config: &Config) {
        for word in 0..config.enable_words {
            self.bus.write32(self.dist_base + gicd::ISENABLER + 4 * word, u32::MAX);
        }
        for _ in 0..config.settle_spins {
            spin_loop();
        }
        self.bus.barrier();
        self.bus.write32(self.dist_base + gicd::CTLR, 1);

        self.bus.write32(self.cpu_base + gicc::PMR, config.priority_mask);
        self.bus.write32(self.cpu_base + gicc::CTLR, 1);

        log::info!(
            "gic: distributor {:#x} cpu interface {:#x}, {} lines enabled",
            self.dist_base,
            self.cpu_base,
            config.enable_words * 32
        );
    }
}

impl<B: Bus> InterruptController for Gic<B> {
    #[inline]
    fn acknowledge(&self) -> Ack {
        Ack(self.bus.read32(self.cpu_base + gicc::IAR))
    }

    #[inline]
    fn end_of_interrupt(&self, ack: Ack) {
        self.bus.write32(self.cpu_base + gicc::EOIR, ack.raw());
    }
}
