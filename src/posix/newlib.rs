//! newlib syscall hooks
//!
//! The symbols newlib's `libc` links against when built without an OS layer.
//! Each hook locks the shared host and forwards to the shim of the same name
//! in the parent module. The `_r` variants ignore the reentrancy context:
//! there is one execution context and one errno.
//!
//! `_exit` does not take the lock. It can be reached from a panic or an
//! `abort` while the host is held.

use core::ffi::{c_char, c_int, c_void};
use core::ptr::addr_of;

use spin::{Mutex, Once};

use super::{ProgramBreak, StatPrefix};
use crate::config::Config;
use crate::console::HOST;
use crate::error::Errno;
use crate::semihosting::{Host, Semihosting};

extern "C" {
    /// End of the static image, from the linker script
    static _end: u8;

    fn __errno() -> *mut c_int;
}

/// Copy an error code into newlib's `errno`.
pub(super) fn mirror_errno(errno: Errno) {
    // SAFETY: newlib returns the address of the current reent's errno field
    unsafe {
        *__errno() = errno.raw();
    }
}

#[no_mangle]
pub unsafe extern "C" fn _open(path: *const c_char, flags: c_int, _mode: c_int) -> c_int {
    // SAFETY: the C caller passes a NUL-terminated path
    unsafe { super::open(&mut *HOST.lock(), path, flags) }
}

#[no_mangle]
pub extern "C" fn _close(fd: c_int) -> c_int {
    super::close(&mut *HOST.lock(), fd)
}

#[no_mangle]
pub unsafe extern "C" fn _write(fd: c_int, buf: *const c_void, len: usize) -> isize {
    // SAFETY: the C caller passes a buffer of `len` readable bytes
    unsafe { super::write(&mut *HOST.lock(), fd, buf.cast(), len) as isize }
}

#[no_mangle]
pub unsafe extern "C" fn _read(fd: c_int, buf: *mut c_void, len: usize) -> isize {
    // SAFETY: the C caller passes a buffer of `len` writable bytes
    unsafe { super::read(&mut *HOST.lock(), fd, buf.cast(), len) as isize }
}

#[no_mangle]
pub extern "C" fn _lseek(fd: c_int, pos: c_int, whence: c_int) -> c_int {
    super::lseek(&mut *HOST.lock(), fd, pos, whence)
}

#[no_mangle]
pub unsafe extern "C" fn _fstat(fd: c_int, st: *mut StatPrefix) -> c_int {
    // SAFETY: the C caller passes a `struct stat`, which begins with StatPrefix
    unsafe { super::fstat(fd, st) }
}

#[no_mangle]
pub extern "C" fn _isatty(fd: c_int) -> c_int {
    super::isatty(&mut *HOST.lock(), fd)
}

#[no_mangle]
pub extern "C" fn _exit(status: c_int) -> ! {
    let mut host = Host::new(Semihosting::new(Config::DEFAULT.address_policy));
    super::exit(&mut host, status)
}

#[no_mangle]
pub extern "C" fn lseek_set(fd: c_int, pos: c_int) -> c_int {
    super::lseek_set(&mut *HOST.lock(), fd, pos)
}

#[no_mangle]
pub extern "C" fn flen(fd: c_int) -> c_int {
    super::flen(&mut *HOST.lock(), fd)
}

static BREAK: Once<Mutex<ProgramBreak>> = Once::new();

fn program_break() -> &'static Mutex<ProgramBreak> {
    BREAK.call_once(|| {
        // SAFETY: only the symbol's address is taken
        let start = unsafe { addr_of!(_end) } as usize;
        Mutex::new(ProgramBreak::new(start, None))
    })
}

#[no_mangle]
pub extern "C" fn _sbrk(increment: isize) -> *mut c_void {
    match program_break().lock().sbrk(increment) {
        Ok(previous) => previous as *mut c_void,
        Err(err) => {
            super::set_errno(err.errno());
            usize::MAX as *mut c_void
        }
    }
}

// Reentrant forms

#[no_mangle]
pub unsafe extern "C" fn _open_r(
    _reent: *mut c_void,
    path: *const c_char,
    flags: c_int,
    mode: c_int,
) -> c_int {
    // SAFETY: forwarded from the C caller
    unsafe { _open(path, flags, mode) }
}

#[no_mangle]
pub extern "C" fn _close_r(_reent: *mut c_void, fd: c_int) -> c_int {
    _close(fd)
}

#[no_mangle]
pub unsafe extern "C" fn _write_r(
    _reent: *mut c_void,
    fd: c_int,
    buf: *const c_void,
    len: usize,
) -> isize {
    // SAFETY: forwarded from the C caller
    unsafe { _write(fd, buf, len) }
}

#[no_mangle]
pub unsafe extern "C" fn _read_r(_reent: *mut c_void, fd: c_int, buf: *mut c_void, len: usize) -> isize {
    // SAFETY: forwarded from the C caller
    unsafe { _read(fd, buf, len) }
}

#[no_mangle]
pub extern "C" fn _lseek_r(_reent: *mut c_void, fd: c_int, pos: c_int, whence: c_int) -> c_int {
    _lseek(fd, pos, whence)
}

#[no_mangle]
pub unsafe extern "C" fn _fstat_r(_reent: *mut c_void, fd: c_int, st: *mut StatPrefix) -> c_int {
    // SAFETY: forwarded from the C caller
    unsafe { _fstat(fd, st) }
}

#[no_mangle]
pub extern "C" fn _isatty_r(_reent: *mut c_void, fd: c_int) -> c_int {
    _isatty(fd)
}
