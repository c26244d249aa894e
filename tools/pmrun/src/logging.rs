//! Console logger for the runner.

use std::io::{self, Write};
use std::thread;

use chrono::Local;
use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Installs the console logger at `level`.
pub fn setup(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    log::trace!("Logger is ready");
    Ok(())
}

/// Prints records to stderr with a timestamp and the emitting thread.
struct ConsoleLogger;

impl ConsoleLogger {
    fn level(level: Level) -> ColoredString {
        let label = format!("{level:>5}");
        match level {
            Level::Error => label.red().bold(),
            Level::Warn => label.yellow(),
            Level::Info => label.green(),
            Level::Debug => label.blue(),
            Level::Trace => label.magenta(),
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = Local::now().format("%H:%M:%S%.3f");
        let thread = thread::current();
        let name = thread.name().unwrap_or("?");
        let mut stderr = io::stderr().lock();
        let _ = writeln!(
            stderr,
            "{} {} {} {}",
            now.to_string().dimmed(),
            Self::level(record.level()),
            format!("[{name}]").dimmed(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
