//! Bridge I/O window
//!
//! Six 32-bit registers through which the simulator-side peer hands the core
//! a request and collects the response:
//!
//! ```text
//!   +0   go            peer → core   request raised
//!   +4   done          core → peer   response is final
//!   +8   input base    peer → core
//!   +12  input size    peer → core   bytes
//!   +16  output base   core → peer
//!   +20  output size   core → peer   bytes
//! ```
//!
//! `done` is the only synchronisation point. Everything written to the
//! output buffer must be visible before it is set, so [`BridgeWindow::signal_done`]
//! issues a barrier first and must be the handler's last write.

pub mod avoidance;

pub use avoidance::{AvoidanceHandler, AvoidanceParams, Command, Maneuver};

use crate::mmio::Bus;

/// Register offsets
mod regs {
    pub const GO: usize = 0x00;
    pub const DONE: usize = 0x04;
    pub const INPUT_BASE: usize = 0x08;
    pub const INPUT_SIZE: usize = 0x0C;
    pub const OUTPUT_BASE: usize = 0x10;
    pub const OUTPUT_SIZE: usize = 0x14;
}

/// Snapshot of the window registers, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub go: u32,
    pub done: u32,
    pub input_base: u32,
    pub input_size: u32,
    pub output_base: u32,
    pub output_size: u32,
}

/// The register block plus the buffers it points at
pub struct BridgeWindow<B> {
    bus: B,
    base: usize,
}

impl<B: Bus> BridgeWindow<B> {
    pub const fn new(bus: B, base: usize) -> Self {
        Self { bus, base }
    }

    #[inline]
    fn reg(&self, offset: usize) -> u32 {
        self.bus.read32(self.base + offset)
    }

    #[inline]
    fn set_reg(&self, offset: usize, value: u32) {
        self.bus.write32(self.base + offset, value)
    }

    pub fn go(&self) -> u32 {
        self.reg(regs::GO)
    }

    pub fn done(&self) -> u32 {
        self.reg(regs::DONE)
    }

    pub fn input_base(&self) -> u32 {
        self.reg(regs::INPUT_BASE)
    }

    pub fn input_size(&self) -> u32 {
        self.reg(regs::INPUT_SIZE)
    }

    pub fn output_base(&self) -> u32 {
        self.reg(regs::OUTPUT_BASE)
    }

    pub fn output_size(&self) -> u32 {
        self.reg(regs::OUTPUT_SIZE)
    }

    pub fn snapshot(&self) -> WindowState {
        WindowState {
            go: self.go(),
            done: self.done(),
            input_base: self.input_base(),
            input_size: self.input_size(),
            output_base: self.output_base(),
            output_size: self.output_size(),
        }
    }

    /// Word `index` of the published input buffer.
    ///
    /// Words past the published size read as `None`.
    pub fn input_word(&self, base: u32, size: u32, index: usize) -> Option<u32> {
        let offset = index.checked_mul(4)?;
        if offset.checked_add(4)? > size as usize {
            return None;
        }
        Some(self.bus.read32(base as usize + offset))
    }

    /// Store word `index` of the output buffer at `base`.
    pub fn write_output_word(&self, base: u32, index: usize, value: u32) {
        self.bus.write32(base as usize + index * 4, value);
    }

    /// Publish the output buffer location and byte count.
    pub fn publish_output(&self, base: u32, size: u32) {
        self.set_reg(regs::OUTPUT_BASE, base);
        self.set_reg(regs::OUTPUT_SIZE, size);
    }

    /// Mark the response final. Must be the last write of a cycle.
    pub fn signal_done(&self) {
        self.bus.barrier();
        self.set_reg(regs::DONE, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Access, FakeBus};

    const BASE: usize = 0x8800_0000;

    #[test]
    fn test_register_offsets() {
        let bus = FakeBus::new();
        for (i, value) in [1, 0, 0x9000_0000, 4, 0x9000_1000, 0].iter().enumerate() {
            bus.poke(BASE + 4 * i, *value);
        }
        let window = BridgeWindow::new(&bus, BASE);
        assert_eq!(
            window.snapshot(),
            WindowState {
                go: 1,
                done: 0,
                input_base: 0x9000_0000,
                input_size: 4,
                output_base: 0x9000_1000,
                output_size: 0,
            }
        );
    }

    #[test]
    fn test_input_bounded_by_published_size() {
        let bus = FakeBus::new();
        bus.poke(0x9000_0000, 11);
        bus.poke(0x9000_0004, 22);
        let window = BridgeWindow::new(&bus, BASE);
        assert_eq!(window.input_word(0x9000_0000, 4, 0), Some(11));
        assert_eq!(window.input_word(0x9000_0000, 4, 1), None);
        assert_eq!(window.input_word(0x9000_0000, 8, 1), Some(22));
        assert_eq!(window.input_word(0x9000_0000, 3, 0), None);
    }

    #[test]
    fn test_done_follows_barrier() {
        let bus = FakeBus::new();
        let window = BridgeWindow::new(&bus, BASE);
        window.publish_output(0x9000_1000, 8);
        window.signal_done();
        assert_eq!(
            bus.log(),
            vec![
                Access::Write(BASE + 0x10, 0x9000_1000),
                Access::Write(BASE + 0x14, 8),
                Access::Barrier,
                Access::Write(BASE + 0x04, 1),
            ]
        );
    }
}
