//! GICv2 CPU interface, as far as the monitor needs it.
//!
//! Only the acknowledge/end-of-interrupt pair is used. The distributor and
//! the CPU interface are configured by whatever booted the platform.

use core::ptr;

use crate::arch_impl::traits::InterruptController;

// =============================================================================
// GIC CPU Interface (GICC) Register Offsets
// =============================================================================

/// Interrupt Acknowledge Register
const GICC_IAR: usize = 0x00C;
/// End of Interrupt Register
const GICC_EOIR: usize = 0x010;

/// INTID field of GICC_IAR (bits 9:0)
const INTID_MASK: u32 = 0x3FF;
/// Maximum valid interrupt ID (1020-1022 reserved, 1023 spurious)
const MAX_VALID_IRQ: u32 = 1019;

/// Memory-mapped GICv2 CPU interface at a fixed physical address.
pub struct Gicv2CpuInterface {
    base: usize,
}

impl Gicv2CpuInterface {
    pub const fn new(base: u64) -> Self {
        Self {
            base: base as usize,
        }
    }

    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `base` is the CPU interface frame, mapped device memory.
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: as for `read`.
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

impl InterruptController for Gicv2CpuInterface {
    fn acknowledge(&self) -> Option<u32> {
        let id = self.read(GICC_IAR) & INTID_MASK;
        (id <= MAX_VALID_IRQ).then_some(id)
    }

    #[inline(never)]
    fn end_of_interrupt(&self, id: u32) {
        #[cfg(target_arch = "aarch64")]
        aarch64_cpu::asm::barrier::dsb(aarch64_cpu::asm::barrier::SY);
        self.write(GICC_EOIR, id);
    }
}
