//! Stderr backend for the kernel's `log` output.

use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};

/// Writes `[LEVEL] message` lines to stderr.
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Install a leaked logger as the global `log` backend.
    ///
    /// Only the first call in a process takes effect.
    pub fn install(level: LevelFilter) -> bool {
        let logger: &'static StderrLogger = Box::leak(Box::new(Self::new(level)));
        if log::set_logger(logger).is_err() {
            return false;
        }
        log::set_max_level(level);
        true
    }

    fn format(record: &Record<'_>) -> String {
        format!("[{}] {}", record.level(), record.args())
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
