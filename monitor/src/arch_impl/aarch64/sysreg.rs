//! Level-dependent system register access.
//!
//! Vector base and secure configuration live in different registers at EL1
//! and EL3; callers go through [`SystemRegisters`] with the image's level.

use aarch64_cpu::asm::barrier;
use aarch64_cpu::registers::{SCR_EL3, VBAR_EL1};
use tock_registers::interfaces::{Readable, Writeable};

use crate::config::ExceptionLevel;

pub struct SystemRegisters {
    level: ExceptionLevel,
}

impl SystemRegisters {
    pub const fn new(level: ExceptionLevel) -> Self {
        Self { level }
    }

    /// Point the level's VBAR at `base`.
    pub fn set_vector_base(&self, base: u64) {
        match self.level {
            ExceptionLevel::El1 => VBAR_EL1.set(base),
            // SAFETY: base is the 0x800-aligned monitor vector table.
            ExceptionLevel::El3 => unsafe {
                core::arch::asm!("msr vbar_el3, {}", in(reg) base, options(nomem, nostack));
            },
        }
        barrier::isb(barrier::SY);
    }

    /// Current SCR_EL3; `None` at EL1, which cannot read it.
    pub fn secure_config(&self) -> Option<u64> {
        match self.level {
            ExceptionLevel::El3 => Some(SCR_EL3.get()),
            ExceptionLevel::El1 => None,
        }
    }
}
