//! ARM Semihosting
//!
//! The runtime has no real peripherals for I/O. Every file, console and exit
//! request is handed to the simulator through a single trap instruction:
//!
//! ```text
//!   r0 = operation code      ──►  svc #0xAB (Thumb) / svc #0x123456 (ARM)
//!   r1 = argument (address        │
//!        of a parameter block,    ▼
//!        or a plain value)       host performs the request
//!   r0 ◄── result ───────────────┘
//! ```
//!
//! [`Gateway`] is that one primitive. [`Host`] builds the POSIX-shaped calls on
//! top of it.

mod host;

pub use host::{Fd, Host, OpenFlags, OpenMode};

#[cfg(test)]
pub(crate) use host::{ExitBlock, OpenBlock, RwBlock, SeekBlock};

/// Semihosting operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Op {
    Open = 0x01,
    Close = 0x02,
    WriteC = 0x03,
    Write0 = 0x04,
    Write = 0x05,
    Read = 0x06,
    ReadC = 0x07,
    IsError = 0x08,
    IsTty = 0x09,
    Seek = 0x0A,
    Flen = 0x0C,
    Errno = 0x13,
    /// Legacy exit, reason code passed directly in r1
    Exit = 0x18,
    /// Exit with a `{reason, subcode}` block
    ExitExtended = 0x20,
}

/// Stop reasons understood by the exit traps
pub mod reason {
    /// `ADP_Stopped_ApplicationExit`
    pub const APPLICATION_EXIT: u32 = 0x2_0026;
    /// `ADP_Stopped_RunTimeErrorUnknown`
    pub const RUNTIME_ERROR: u32 = 0x2_0023;
}

/// The privilege-boundary trap.
///
/// Implementations execute exactly one host trap per call and return the
/// host's result register untouched. Negative results are failures; fetching
/// the error code is the caller's business.
pub trait Gateway {
    /// Trap into the host with `op` in r0 and `arg` in r1.
    fn trap(&mut self, op: Op, arg: usize) -> i32;
}

/// Handling of argument addresses that do not fit the host's 32-bit r1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Keep the low 32 bits and hope the high bits were zero.
    Truncate,
    /// Refuse the trap.
    Reject,
}

/// Narrow a native address to the 32-bit value the host reads from r1.
///
/// Returns `None` only under [`AddressPolicy::Reject`] when high bits are set.
#[inline]
pub fn narrow_address(addr: usize, policy: AddressPolicy) -> Option<u32> {
    match u32::try_from(addr) {
        Ok(narrow) => Some(narrow),
        Err(_) => match policy {
            AddressPolicy::Truncate => Some(addr as u32),
            AddressPolicy::Reject => None,
        },
    }
}

/// Hardware trap gateway for AArch32 semihosting
#[derive(Debug, Clone, Copy)]
pub struct Semihosting {
    policy: AddressPolicy,
}

impl Semihosting {
    /// Create a gateway.
    pub const fn new(policy: AddressPolicy) -> Self {
        Self { policy }
    }

    /// Address policy in force
    pub const fn policy(&self) -> AddressPolicy {
        self.policy
    }
}

#[cfg(target_arch = "arm")]
impl Gateway for Semihosting {
    fn trap(&mut self, op: Op, arg: usize) -> i32 {
        let Some(arg) = narrow_address(arg, self.policy) else {
            // A log line would need another trap.
            crate::halt();
        };
        // SAFETY: the semihosting trap only reads the parameter block the
        // caller handed us and writes r0. lr is clobbered when the SVC is
        // taken in supervisor mode.
        unsafe { raw_trap(op as u32, arg) }
    }
}

#[cfg(all(target_arch = "arm", target_feature = "thumb-mode"))]
#[inline(always)]
unsafe fn raw_trap(op: u32, arg: u32) -> i32 {
    let mut r0 = op;
    // SAFETY: caller upholds the semihosting contract
    unsafe {
        core::arch::asm!(
            "svc #0xAB",
            inout("r0") r0,
            in("r1") arg,
            out("lr") _,
            options(nostack)
        );
    }
    r0 as i32
}

#[cfg(all(target_arch = "arm", not(target_feature = "thumb-mode")))]
#[inline(always)]
unsafe fn raw_trap(op: u32, arg: u32) -> i32 {
    let mut r0 = op;
    // SAFETY: caller upholds the semihosting contract
    unsafe {
        core::arch::asm!(
            "svc #0x123456",
            inout("r0") r0,
            in("r1") arg,
            out("lr") _,
            options(nostack)
        );
    }
    r0 as i32
}
