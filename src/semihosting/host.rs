//! POSIX-shaped calls over the semihosting gateway
//!
//! Each call builds the parameter block the host expects for its operation
//! code, traps once, and turns a negative result into [`Error::Host`] after
//! asking the host for its last error. Nothing here retries.

use core::ffi::{c_char, c_int, CStr};

use bitflags::bitflags;

use super::{reason, Gateway, Op};
use crate::error::{Errno, Error, Result};

/// A host file handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Fd(pub i32);

impl Fd {
    pub const STDOUT: Self = Self(1);
    pub const STDERR: Self = Self(2);

    /// Console handles skip the parameter block and write byte by byte.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 == Self::STDOUT.0 || self.0 == Self::STDERR.0
    }
}

bitflags! {
    /// POSIX `open` flags, with newlib's values
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0x0001;
        const RDWR = 0x0002;
        const APPEND = 0x0008;
        const CREAT = 0x0200;
        const TRUNC = 0x0400;
    }
}

bitflags! {
    /// Semihosting open mode (an `fopen`-style mode index, not POSIX)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        /// `"r"`; no bits set
        const READ = 0;
        /// `"b"` variant of the mode
        const BINARY = 1;
        /// `"w"`
        const WRITE = 4;
        /// `"a"`
        const APPEND = 8;
    }
}

impl OpenMode {
    /// Translate POSIX open flags.
    ///
    /// Append wins over write intent. The binary bit is always set since the
    /// host makes no text/binary distinction.
    pub fn from_flags(flags: OpenFlags) -> Self {
        let base = if flags.contains(OpenFlags::APPEND) {
            OpenMode::APPEND
        } else if flags.intersects(
            OpenFlags::WRONLY | OpenFlags::RDWR | OpenFlags::TRUNC | OpenFlags::CREAT,
        ) {
            OpenMode::WRITE
        } else {
            OpenMode::READ
        };
        base | OpenMode::BINARY
    }
}

/// `SYS_OPEN` parameter block
#[repr(C)]
pub(crate) struct OpenBlock {
    pub name: *const c_char,
    pub mode: c_int,
    pub len: usize,
}

/// `SYS_READ` / `SYS_WRITE` parameter block
#[repr(C)]
pub(crate) struct RwBlock {
    pub fd: c_int,
    pub buf: *mut u8,
    pub len: usize,
}

/// `SYS_SEEK` parameter block
#[repr(C)]
pub(crate) struct SeekBlock {
    pub fd: c_int,
    pub pos: c_int,
}

/// `SYS_EXIT_EXTENDED` parameter block
#[repr(C)]
pub(crate) struct ExitBlock {
    pub reason: c_int,
    pub subcode: c_int,
}

/// The syscall emulation layer
///
/// Generic over the gateway so the same code drives the simulator and the
/// in-memory host used by the tests.
pub struct Host<G> {
    gateway: G,
}

impl<G: Gateway> Host<G> {
    /// Wrap a gateway.
    pub const fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Borrow the gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Trap, mapping a negative result to the host's errno.
    fn call(&mut self, op: Op, arg: usize) -> Result<i32> {
        let ret = self.gateway.trap(op, arg);
        if ret < 0 {
            return Err(Error::Host(self.last_error()));
        }
        Ok(ret)
    }

    /// Ask the host for the error code of the last failed call.
    pub fn last_error(&mut self) -> Errno {
        Errno(self.gateway.trap(Op::Errno, 0))
    }

    /// Open a host file.
    pub fn open(&mut self, path: &CStr, flags: OpenFlags) -> Result<Fd> {
        let block = OpenBlock {
            name: path.as_ptr(),
            mode: OpenMode::from_flags(flags).bits() as c_int,
            len: path.to_bytes().len(),
        };
        let fd = self.call(Op::Open, &block as *const OpenBlock as usize)?;
        Ok(Fd(fd))
    }

    /// Close a host file.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.call(Op::Close, fd.0 as usize)?;
        Ok(())
    }

    /// Write `buf`, returning the number of bytes the host accepted.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        if fd.is_console() {
            for byte in buf {
                self.call(Op::WriteC, byte as *const u8 as usize)?;
            }
            return Ok(buf.len());
        }

        let block = RwBlock {
            fd: fd.0,
            buf: buf.as_ptr() as *mut u8,
            len: buf.len(),
        };
        // The host answers with the number of bytes it did NOT write.
        let not_written = self.call(Op::Write, &block as *const RwBlock as usize)?;
        Ok(buf.len().saturating_sub(not_written as usize))
    }

    /// Read into `buf`, returning the number of bytes filled.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let block = RwBlock {
            fd: fd.0,
            buf: buf.as_mut_ptr(),
            len: buf.len(),
        };
        let not_read = self.call(Op::Read, &block as *const RwBlock as usize)?;
        Ok(buf.len().saturating_sub(not_read as usize))
    }

    /// Seek to an absolute position. Relative seeks are not emulated.
    pub fn seek(&mut self, fd: Fd, pos: i32) -> Result<()> {
        let block = SeekBlock { fd: fd.0, pos };
        self.call(Op::Seek, &block as *const SeekBlock as usize)?;
        Ok(())
    }

    /// Whether the handle is an interactive device.
    pub fn isatty(&mut self, fd: Fd) -> Result<bool> {
        let ret = self.call(Op::IsTty, fd.0 as usize)?;
        Ok(ret != 0)
    }

    /// Length of the host file in bytes.
    pub fn flen(&mut self, fd: Fd) -> Result<usize> {
        let len = self.call(Op::Flen, fd.0 as usize)?;
        Ok(len as usize)
    }

    /// Report `status` to the host and stop the core.
    pub fn exit(&mut self, status: i32) -> ! {
        self.notify_exit(status);
        crate::halt();
    }

    /// The exit traps, without the final halt.
    ///
    /// Tries the extended form first. A host that returns from it gets the
    /// legacy form with a bare reason code.
    pub(crate) fn notify_exit(&mut self, status: i32) {
        let block = ExitBlock {
            reason: reason::APPLICATION_EXIT as c_int,
            subcode: status,
        };
        self.gateway.trap(Op::ExitExtended, &block as *const ExitBlock as usize);

        let legacy = if status == 0 {
            reason::APPLICATION_EXIT
        } else {
            reason::RUNTIME_ERROR
        };
        self.gateway.trap(Op::Exit, legacy as usize);
    }
}
