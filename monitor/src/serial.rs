//! PL011 UART output for the monitor.
//!
//! The monitor runs with the MMU off, so registers are addressed physically
//! at [`UART_BASE`]. Output only; the monitor never reads the console.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::config::UART_BASE;

// =============================================================================
// PL011 UART Register Map
// =============================================================================

mod reg {
    /// Data Register
    pub const DR: usize = 0x00;
    /// Flag Register (read-only)
    pub const FR: usize = 0x18;
    /// Control Register
    pub const CR: usize = 0x30;
}

mod flag {
    /// Transmit FIFO full
    pub const TXFF: u32 = 1 << 5;
}

mod cr {
    /// UART enable
    pub const UARTEN: u32 = 1 << 0;
    /// Transmit enable
    pub const TXE: u32 = 1 << 8;
}

#[inline]
fn read_reg(offset: usize) -> u32 {
    // SAFETY: UART_BASE is the platform's PL011, identity-mapped.
    unsafe { core::ptr::read_volatile((UART_BASE as usize + offset) as *const u32) }
}

#[inline]
fn write_reg(offset: usize, value: u32) {
    // SAFETY: as for read_reg.
    unsafe { core::ptr::write_volatile((UART_BASE as usize + offset) as *mut u32, value) }
}

fn send(byte: u8) {
    while (read_reg(reg::FR) & flag::TXFF) != 0 {
        core::hint::spin_loop();
    }
    write_reg(reg::DR, byte as u32);
}

// =============================================================================
// Serial Port
// =============================================================================

pub struct SerialPort;

static SERIAL_INITIALIZED: AtomicBool = AtomicBool::new(false);

impl SerialPort {
    pub const fn new() -> Self {
        SerialPort
    }

    /// Enable the transmitter. Firmware before us normally set the baud
    /// rate already; it is left alone.
    pub fn init(&mut self) {
        if SERIAL_INITIALIZED.load(Ordering::Relaxed) {
            return;
        }
        let control = read_reg(reg::CR);
        write_reg(reg::CR, control | cr::UARTEN | cr::TXE);
        SERIAL_INITIALIZED.store(true, Ordering::Release);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                send(b'\r');
            }
            send(byte);
        }
        Ok(())
    }
}

pub static SERIAL: Mutex<SerialPort> = Mutex::new(SerialPort::new());

pub fn init() {
    SERIAL.lock().init();
}

/// Write through the shared port. Falls back to unlocked output when the
/// port is held, which only happens if a trap interrupted a print on this
/// core.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;

    match SERIAL.try_lock() {
        Some(mut serial) => {
            let _ = serial.write_fmt(args);
        }
        None => emergency_print(args),
    }
}

/// Unlocked output for the fatal path.
pub fn emergency_print(args: fmt::Arguments) {
    use core::fmt::Write;

    let _ = SerialPort.write_fmt(args);
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}
