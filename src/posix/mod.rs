//! C-convention file and process calls
//!
//! Thin shims over [`Host`] that speak the C library's language: raw
//! pointers in, `-1` plus an errno out. They are generic over the gateway so
//! the exact return-value contract can be tested against an in-memory host;
//! [`newlib`] binds them to the exported symbol names.
//!
//! # Limitations
//! - Only absolute seeks. Anything else fails with `ESPIPE`.
//! - `fstat` never asks the host. Every handle is a character device of
//!   size zero, which is enough for newlib to pick line buffering.
//! - The mode argument of `open` is ignored; the host has no permissions.

#[cfg(all(feature = "newlib", target_arch = "arm", target_os = "none"))]
pub mod newlib;

use core::ffi::{c_char, c_int, CStr};
use core::sync::atomic::{AtomicI32, Ordering};

use crate::error::{Errno, Error, Result};
use crate::semihosting::{Fd, Gateway, Host, OpenFlags};

/// `lseek` whence values
pub mod whence {
    pub const SEEK_SET: i32 = 0;
    pub const SEEK_CUR: i32 = 1;
    pub const SEEK_END: i32 = 2;
}

/// Character device file type bit of `st_mode`
pub const S_IFCHR: u32 = 0o020000;

/// The leading fields of newlib's `struct stat` on 32-bit ARM.
///
/// `fstat` only writes `st_mode` and `st_size`; the rest of the caller's
/// structure is left alone.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct StatPrefix {
    pub st_dev: i16,
    pub st_ino: u16,
    pub st_mode: u32,
    pub st_nlink: u16,
    pub st_uid: u16,
    pub st_gid: u16,
    pub st_rdev: i16,
    pub st_size: i32,
}

#[cfg(not(test))]
fn errno_slot<R>(f: impl FnOnce(&AtomicI32) -> R) -> R {
    static ERRNO: AtomicI32 = AtomicI32::new(0);
    f(&ERRNO)
}

// One slot per test thread.
#[cfg(test)]
fn errno_slot<R>(f: impl FnOnce(&AtomicI32) -> R) -> R {
    std::thread_local! {
        static ERRNO: AtomicI32 = const { AtomicI32::new(0) };
    }
    ERRNO.with(f)
}

/// Error code of the last failed call.
pub fn errno() -> Errno {
    Errno(errno_slot(|slot| slot.load(Ordering::Relaxed)))
}

/// Record an error code for C callers.
pub fn set_errno(errno: Errno) {
    errno_slot(|slot| slot.store(errno.raw(), Ordering::Relaxed));
    #[cfg(all(feature = "newlib", target_arch = "arm", target_os = "none"))]
    newlib::mirror_errno(errno);
}

/// Collapse a result to the C convention.
fn c_ret(result: Result<c_int>) -> c_int {
    match result {
        Ok(value) => value,
        Err(err) => {
            set_errno(err.errno());
            -1
        }
    }
}

/// Borrow a caller buffer, refusing a null pointer with a nonzero length.
///
/// # Safety
/// A non-null `ptr` must be valid for reads of `len` bytes.
unsafe fn user_bytes<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(Error::BadAddress);
    }
    // SAFETY: non-null and valid for `len` bytes per the caller
    Ok(unsafe { core::slice::from_raw_parts(ptr, len) })
}

/// Mutable form of [`user_bytes`].
///
/// # Safety
/// A non-null `ptr` must be valid for writes of `len` bytes.
unsafe fn user_bytes_mut<'a>(ptr: *mut u8, len: usize) -> Result<&'a mut [u8]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(Error::BadAddress);
    }
    // SAFETY: non-null and valid for `len` bytes per the caller
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr, len) })
}

/// Byte counts fit `c_int` for any buffer a 32-bit target can hold.
fn count(n: usize) -> Result<c_int> {
    c_int::try_from(n).map_err(|_| Error::Overflow)
}

/// `open(path, flags, mode)`
///
/// # Safety
/// A non-null `path` must point at a NUL-terminated string.
pub unsafe fn open<G: Gateway>(host: &mut Host<G>, path: *const c_char, flags: c_int) -> c_int {
    if path.is_null() {
        return c_ret(Err(Error::BadAddress));
    }
    // SAFETY: non-null and NUL-terminated per the caller
    let path = unsafe { CStr::from_ptr(path) };
    let flags = OpenFlags::from_bits_truncate(flags as u32);
    c_ret(host.open(path, flags).map(|fd| fd.0))
}

/// `close(fd)`
pub fn close<G: Gateway>(host: &mut Host<G>, fd: c_int) -> c_int {
    c_ret(host.close(Fd(fd)).map(|()| 0))
}

/// `write(fd, buf, len)`, returning the number of bytes written.
///
/// # Safety
/// A non-null `buf` must be valid for reads of `len` bytes.
pub unsafe fn write<G: Gateway>(host: &mut Host<G>, fd: c_int, buf: *const u8, len: usize) -> c_int {
    // SAFETY: forwarded from the caller
    let result = unsafe { user_bytes(buf, len) }
        .and_then(|bytes| host.write(Fd(fd), bytes))
        .and_then(count);
    c_ret(result)
}

/// `read(fd, buf, len)`, returning the number of bytes read.
///
/// # Safety
/// A non-null `buf` must be valid for writes of `len` bytes.
pub unsafe fn read<G: Gateway>(host: &mut Host<G>, fd: c_int, buf: *mut u8, len: usize) -> c_int {
    // SAFETY: forwarded from the caller
    let result = unsafe { user_bytes_mut(buf, len) }
        .and_then(|bytes| host.read(Fd(fd), bytes))
        .and_then(count);
    c_ret(result)
}

/// Absolute seek. Returns 0 on success.
pub fn lseek_set<G: Gateway>(host: &mut Host<G>, fd: c_int, pos: c_int) -> c_int {
    c_ret(host.seek(Fd(fd), pos).map(|()| 0))
}

/// `lseek(fd, pos, whence)`
///
/// Returns 0 rather than the new offset on success.
pub fn lseek<G: Gateway>(host: &mut Host<G>, fd: c_int, pos: c_int, whence: c_int) -> c_int {
    if whence != whence::SEEK_SET {
        return c_ret(Err(Error::Unsupported));
    }
    lseek_set(host, fd, pos)
}

/// `isatty(fd)`: 1 for an interactive device, otherwise 0.
///
/// A host failure reads as "not a terminal", with errno set.
pub fn isatty<G: Gateway>(host: &mut Host<G>, fd: c_int) -> c_int {
    match host.isatty(Fd(fd)) {
        Ok(tty) => c_int::from(tty),
        Err(err) => {
            set_errno(err.errno());
            0
        }
    }
}

/// Length of a host file, or -1.
pub fn flen<G: Gateway>(host: &mut Host<G>, fd: c_int) -> c_int {
    c_ret(host.flen(Fd(fd)).and_then(count))
}

/// `fstat(fd, st)`. Does not trap.
///
/// # Safety
/// A non-null `st` must be valid for writes of a [`StatPrefix`].
pub unsafe fn fstat(_fd: c_int, st: *mut StatPrefix) -> c_int {
    if st.is_null() {
        return -1;
    }
    // SAFETY: non-null and writable per the caller
    unsafe {
        (*st).st_mode = S_IFCHR;
        (*st).st_size = 0;
    }
    0
}

/// `_exit(status)`
pub fn exit<G: Gateway>(host: &mut Host<G>, status: c_int) -> ! {
    host.exit(status)
}

/// Program break for `sbrk`
///
/// Starts at the end of the static image and moves in either direction,
/// never below where it started nor past `limit` when one is set.
#[derive(Debug)]
pub struct ProgramBreak {
    start: usize,
    current: usize,
    limit: Option<usize>,
}

impl ProgramBreak {
    pub const fn new(start: usize, limit: Option<usize>) -> Self {
        Self {
            start,
            current: start,
            limit,
        }
    }

    /// Current break
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move the break by `increment` bytes, returning the previous break.
    pub fn sbrk(&mut self, increment: isize) -> Result<usize> {
        let previous = self.current;
        let next = previous
            .checked_add_signed(increment)
            .ok_or(Error::OutOfMemory)?;
        if next < self.start || self.limit.is_some_and(|limit| next > limit) {
            return Err(Error::OutOfMemory);
        }
        self.current = next;
        Ok(previous)
    }
}
