//! `log` backend for the semihosting console
//!
//! Records are printed as `[LEVEL] target: message`, one per line. There is
//! no buffering; each record costs one trap per byte.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Logger writing through [`crate::console`]
struct SemihostLogger;

impl log::Log for SemihostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::console::_print(format_args!(
                "{}\n",
                Line {
                    level: record.level(),
                    target: record.target(),
                    args: *record.args(),
                }
            ));
        }
    }

    fn flush(&self) {}
}

/// One formatted record, without the newline
struct Line<'a> {
    level: Level,
    target: &'a str,
    args: fmt::Arguments<'a>,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        f.write_char('[')?;
        f.write_str(level)?;
        write!(f, "] {}: {}", self.target, self.args)
    }
}

static LOGGER: SemihostLogger = SemihostLogger;

/// Install the console logger at `level`.
///
/// Fails if another logger was installed first.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(level: Level, target: &str, args: fmt::Arguments) -> String {
        Line {
            level,
            target,
            args,
        }
        .to_string()
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            render(Level::Info, "simrt::gic", format_args!("enabled {} lines", 128)),
            "[INFO ] simrt::gic: enabled 128 lines"
        );
        assert_eq!(
            render(Level::Error, "fw", format_args!("boom")),
            "[ERROR] fw: boom"
        );
    }

    #[test]
    fn test_levels_are_padded_to_one_width() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            let line = render(level, "t", format_args!("m"));
            assert_eq!(line.find(']'), Some(6), "{}", line);
        }
    }
}
