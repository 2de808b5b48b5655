//! Memory-mapped register access
//!
//! Drivers talk to hardware through [`Bus`] so the register protocols can be
//! exercised against a fake memory in tests.

use core::sync::atomic::{fence, Ordering};

/// 32-bit register access
pub trait Bus {
    /// Read the word at `addr`.
    fn read32(&self, addr: usize) -> u32;

    /// Write `value` to the word at `addr`.
    fn write32(&self, addr: usize, value: u32);

    /// Order all earlier accesses before any later one.
    fn barrier(&self) {
        fence(Ordering::SeqCst);
    }
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    fn barrier(&self) {
        (**self).barrier()
    }
}

/// Volatile access to the physical address space
#[derive(Debug, Clone, Copy)]
pub struct Volatile {
    _private: (),
}

impl Volatile {
    /// Create a handle to physical memory.
    ///
    /// # Safety
    /// - Every address later passed to [`Bus`] methods must be a mapped,
    ///   4-byte aligned device register or RAM word
    /// - Device registers reached through it must tolerate 32-bit accesses;
    ///   reads of read-to-clear registers count as side effects
    /// - No Rust reference may alias the memory behind those addresses
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Bus for Volatile {
    #[inline]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: address validity is the contract of Volatile::new
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    #[inline]
    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: address validity is the contract of Volatile::new
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_on_ram() {
        let mut word = 0u32;
        let addr = &mut word as *mut u32 as usize;
        // SAFETY: addr is a live, aligned local
        let bus = unsafe { Volatile::new() };
        bus.write32(addr, 0xDEAD_BEEF);
        assert_eq!(bus.read32(addr), 0xDEAD_BEEF);
        bus.barrier();
        assert_eq!(word, 0xDEAD_BEEF);
    }
}
