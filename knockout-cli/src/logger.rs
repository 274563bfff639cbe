use std::fmt::Display;
use std::io::{self, Write};

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Installs the [`Logger`] with the maximum level `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&Logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Writes log lines to stderr. Stdout is reserved for command output.
#[derive(Copy, Clone, Debug)]
pub struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(Local::now().format("%Y-%m-%d %H:%M:%S"), record);

        // Nowhere left to report a failed write to stderr.
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Formats `record` as `[time] [LEVEL] target (file:line): message`.
fn format_record<T>(time: T, record: &Record) -> String
where
    T: Display,
{
    let location = match (record.file(), record.line()) {
        (Some(file), Some(line)) => format!(" ({}:{})", file, line),
        (Some(file), None) => format!(" ({})", file),
        _ => String::new(),
    };

    format!(
        "[{}] [{:<5}] {}{}: {}",
        time,
        record.level(),
        record.target(),
        location,
        record.args()
    )
}
