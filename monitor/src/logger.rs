//! `log` backend for the monitor.
//!
//! Records are buffered in memory until the UART is up, then written to it
//! as `[LEVEL] target: message`. Every lock is taken with `try_lock` since
//! the logger is called from trap context.

use core::fmt::{self, Write};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

const BUFFER_SIZE: usize = 8192;

/// Early-boot record buffer. Whole records that do not fit are dropped and
/// counted.
pub struct LogBuffer {
    buffer: [u8; BUFFER_SIZE],
    position: usize,
    dropped: usize,
}

impl LogBuffer {
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            position: 0,
            dropped: 0,
        }
    }

    fn push_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = BUFFER_SIZE - self.position;
        if bytes.len() > remaining {
            return Err(fmt::Error);
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Append one formatted record, all or nothing.
    pub fn push_record(&mut self, args: fmt::Arguments) {
        let start = self.position;
        if self.write_fmt(args).is_err() {
            self.position = start;
            self.dropped += 1;
        }
    }

    pub fn contents(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.position]).unwrap_or("<invalid UTF-8>")
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.position = 0;
        self.dropped = 0;
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for LogBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s)
    }
}

enum LoggerState {
    /// Buffering records until the UART is ready
    Buffering,
    /// Writing straight to the UART
    SerialReady,
}

pub struct MonitorLogger {
    buffer: Mutex<LogBuffer>,
    state: Mutex<LoggerState>,
}

impl MonitorLogger {
    pub const fn new() -> Self {
        MonitorLogger {
            buffer: Mutex::new(LogBuffer::new()),
            state: Mutex::new(LoggerState::Buffering),
        }
    }

    /// Flush the early buffer and switch to direct output.
    pub fn serial_ready(&self) {
        let mut state = self.state.lock();
        let mut buffer = self.buffer.lock();
        if !buffer.contents().is_empty() {
            emit(format_args!("{}", buffer.contents()));
        }
        if buffer.dropped() > 0 {
            emit(format_args!("[ WARN] logger: {} early records dropped\n", buffer.dropped()));
        }
        buffer.clear();
        *state = LoggerState::SerialReady;
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self.state.try_lock().as_deref(), Some(LoggerState::Buffering))
    }

    /// Run `f` over the early buffer.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&LogBuffer) -> R) -> R {
        f(&self.buffer.lock())
    }
}

impl Default for MonitorLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for MonitorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = record.level();
        let target = record.target();
        let args = record.args();

        let state = match self.state.try_lock() {
            Some(state) => state,
            None => {
                // Interrupted serial_ready on this core
                emit(format_args!("[{:>5}] {}: {}\n", level, target, args));
                return;
            }
        };
        match *state {
            LoggerState::Buffering => {
                drop(state);
                match self.buffer.try_lock() {
                    Some(mut buffer) => {
                        buffer.push_record(format_args!("[{:>5}] {}: {}\n", level, target, args))
                    }
                    None => emit(format_args!("[{:>5}] {}: {}\n", level, target, args)),
                }
            }
            LoggerState::SerialReady => {
                drop(state);
                emit(format_args!("[{:>5}] {}: {}\n", level, target, args));
            }
        }
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "aarch64")]
fn emit(args: fmt::Arguments) {
    crate::serial::_print(args);
}

#[cfg(not(target_arch = "aarch64"))]
fn emit(_args: fmt::Arguments) {}

pub static LOGGER: MonitorLogger = MonitorLogger::new();

/// Install [`LOGGER`]; can run before the UART is up.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Call once the UART is initialized.
pub fn serial_ready() {
    LOGGER.serial_ready();
}
