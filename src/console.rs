//! Console output over semihosting
//!
//! The simulator's console is the only output device. [`Console`] adapts a
//! [`Host`] handle to `core::fmt::Write`; the `hprint!`/`hprintln!` macros
//! format into the shared host behind a spinlock.

use core::fmt::{self, Write};

use crate::semihosting::{Fd, Gateway, Host};

/// `fmt::Write` adapter writing to one host handle
pub struct Console<'a, G> {
    host: &'a mut Host<G>,
    fd: Fd,
}

impl<'a, G: Gateway> Console<'a, G> {
    pub fn new(host: &'a mut Host<G>, fd: Fd) -> Self {
        Self { host, fd }
    }

    /// Console on standard output
    pub fn stdout(host: &'a mut Host<G>) -> Self {
        Self::new(host, Fd::STDOUT)
    }
}

impl<G: Gateway> Write for Console<'_, G> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.host
            .write(self.fd, s.as_bytes())
            .map(|_| ())
            .map_err(|_| fmt::Error)
    }
}

/// Shared semihosting handle for console output and logging
#[cfg(target_arch = "arm")]
pub static HOST: spin::Mutex<Host<crate::semihosting::Semihosting>> =
    spin::Mutex::new(Host::new(crate::semihosting::Semihosting::new(
        crate::config::Config::DEFAULT.address_policy,
    )));

/// Write formatted text to standard output.
///
/// Output that arrives while the host is held elsewhere (an IRQ landing in
/// the middle of a print) is dropped rather than deadlocking.
#[doc(hidden)]
#[cfg(target_arch = "arm")]
pub fn _print(args: fmt::Arguments) {
    if let Some(mut host) = HOST.try_lock() {
        let _ = Console::stdout(&mut *host).write_fmt(args);
    }
}

#[doc(hidden)]
#[cfg(all(test, not(target_arch = "arm")))]
pub fn _print(args: fmt::Arguments) {
    std::print!("{}", args);
}

#[doc(hidden)]
#[cfg(not(any(test, target_arch = "arm")))]
pub fn _print(_args: fmt::Arguments) {}

/// Print to the host console
#[macro_export]
macro_rules! hprint {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!($($arg)*))
    };
}

/// Print a line to the host console
#[macro_export]
macro_rules! hprintln {
    () => {
        $crate::hprint!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::hprint!($($arg)*);
        $crate::hprint!("\n");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semihosting::{Op, OpenFlags};
    use crate::testing::MockHost;

    #[test]
    fn test_formatted_console_output() {
        let mut host = Host::new(MockHost::new());
        writeln!(Console::stdout(&mut host), "tick {} of {:#x}", 3, 16).unwrap();
        assert_eq!(host.gateway().console(), b"tick 3 of 0x10\n");
        assert_eq!(host.gateway().count(Op::WriteC), 15);
    }

    #[test]
    fn test_console_on_a_file_handle() {
        let mut host = Host::new(MockHost::new());
        let fd = host
            .open(c"out.log", OpenFlags::WRONLY | OpenFlags::CREAT)
            .unwrap();
        write!(Console::new(&mut host, fd), "{}-{}", "a", 1).unwrap();
        assert_eq!(host.gateway().file("out.log"), Some(&b"a-1"[..]));
        assert!(host.gateway().console().is_empty());
    }

    #[test]
    fn test_host_error_surfaces_as_fmt_error() {
        let mut host = Host::new(MockHost::new());
        let result = write!(Console::new(&mut host, Fd(99)), "lost");
        assert!(result.is_err());
    }

    #[test]
    fn test_macros_expand() {
        crate::hprint!("");
        crate::hprintln!();
        crate::hprintln!("value {}", 1);
    }
}
