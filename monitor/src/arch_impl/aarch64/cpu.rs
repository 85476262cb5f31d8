//! ARM64 core operations for the monitor.
//!
//! The monitor never unmasks interrupts for itself; it only masks them on
//! the fatal path and parks the core with WFE.

use aarch64_cpu::asm;
use aarch64_cpu::registers::MPIDR_EL1;
use tock_registers::interfaces::Readable;

use super::constants::core_index;
use crate::arch_impl::traits::CpuOps;

pub struct Aarch64Cpu;

impl CpuOps for Aarch64Cpu {
    /// Sets D, A, I and F.
    #[inline]
    unsafe fn mask_all() {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }

    #[inline]
    fn halt() {
        asm::wfe();
    }

    /// Cluster and core affinity of MPIDR_EL1, folded into one index.
    #[inline]
    fn current_core() -> usize {
        core_index(MPIDR_EL1.get())
    }
}
