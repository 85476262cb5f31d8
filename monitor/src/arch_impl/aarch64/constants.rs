//! ARM64 architectural constants used by the monitor.
//!
//! Multi-bit register fields are described with `tock-registers` so they can
//! be decoded from saved values on any host; flag-style registers use
//! `bitflags`.

use bitflags::bitflags;
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::config::CPUS_PER_CLUSTER;

// ============================================================================
// Exception Syndrome Register
// ============================================================================

register_bitfields! [u64,
    /// ESR_ELx as saved in the monitor frame.
    pub ESR [
        /// Exception class
        EC OFFSET(26) NUMBITS(6) [],
        /// Instruction length (1 = 32-bit)
        IL OFFSET(25) NUMBITS(1) [],
        /// Instruction specific syndrome
        ISS OFFSET(0) NUMBITS(25) []
    ],

    /// SPSR_ELx as saved in the monitor frame.
    pub SPSR [
        /// Exception level and stack selector of the interrupted context
        M OFFSET(0) NUMBITS(4) [
            EL0t = 0b0000,
            EL1t = 0b0100,
            EL1h = 0b0101,
            EL2t = 0b1000,
            EL2h = 0b1001,
            EL3t = 0b1100,
            EL3h = 0b1101
        ],
        /// Interrupted context was executing AArch32
        AARCH32 OFFSET(4) NUMBITS(1) [],
        F OFFSET(6) NUMBITS(1) [],
        I OFFSET(7) NUMBITS(1) [],
        A OFFSET(8) NUMBITS(1) [],
        D OFFSET(9) NUMBITS(1) []
    ]
];

pub type EsrValue = LocalRegisterCopy<u64, ESR::Register>;
pub type SpsrValue = LocalRegisterCopy<u64, SPSR::Register>;

/// Exception class values (ESR_ELx.EC) the monitor distinguishes.
pub mod exception_class {
    pub const UNKNOWN: u8 = 0b000000;
    pub const SMC_AARCH32: u8 = 0b010011;
    pub const SVC_AARCH64: u8 = 0b010101;
    pub const HVC_AARCH64: u8 = 0b010110;
    pub const SMC_AARCH64: u8 = 0b010111;
    pub const SYSREG_TRAP: u8 = 0b011000;
    pub const INSTRUCTION_ABORT_LOWER: u8 = 0b100000;
    pub const INSTRUCTION_ABORT_SAME: u8 = 0b100001;
    pub const DATA_ABORT_LOWER: u8 = 0b100100;
    pub const DATA_ABORT_SAME: u8 = 0b100101;
    pub const SERROR: u8 = 0b101111;
    pub const BRK_AARCH64: u8 = 0b111100;

    /// True for the two SMC classes.
    pub const fn is_smc(ec: u8) -> bool {
        matches!(ec, SMC_AARCH64 | SMC_AARCH32)
    }

    pub fn name(ec: u8) -> &'static str {
        match ec {
            UNKNOWN => "unknown",
            SMC_AARCH32 => "SMC (AArch32)",
            SVC_AARCH64 => "SVC",
            HVC_AARCH64 => "HVC",
            SMC_AARCH64 => "SMC",
            SYSREG_TRAP => "system register trap",
            INSTRUCTION_ABORT_LOWER | INSTRUCTION_ABORT_SAME => "instruction abort",
            DATA_ABORT_LOWER | DATA_ABORT_SAME => "data abort",
            SERROR => "SError",
            BRK_AARCH64 => "BRK",
            _ => "other",
        }
    }
}

/// Extract the exception class from a raw ESR value.
pub fn exception_class_of(esr: u64) -> u8 {
    EsrValue::new(esr).read(ESR::EC) as u8
}

/// SPSR for entering EL1 on SP_EL1 with D, A, I and F masked.
///
/// Applet entry state; SMC is undefined at EL0.
pub fn spsr_el1h_masked() -> u64 {
    let mut spsr = SpsrValue::new(0);
    spsr.write(SPSR::M::EL1h + SPSR::D::SET + SPSR::A::SET + SPSR::I::SET + SPSR::F::SET);
    spsr.get()
}

/// True when the saved SPSR returns to AArch64 EL1 on SP_EL1.
pub fn returns_to_el1h(spsr: u64) -> bool {
    let spsr = SpsrValue::new(spsr);
    !spsr.is_set(SPSR::AARCH32) && spsr.matches_all(SPSR::M::EL1h)
}

/// Per-core state index for an MPIDR_EL1 value: Aff1 selects the cluster,
/// Aff0 the core within it. Cores outside the configured topology map past
/// `MAX_CPUS` and are rejected by the per-core lookup.
pub fn core_index(mpidr: u64) -> usize {
    let aff0 = (mpidr & 0xff) as usize;
    let aff1 = ((mpidr >> 8) & 0xff) as usize;
    if aff0 >= CPUS_PER_CLUSTER {
        return usize::MAX;
    }
    aff1 * CPUS_PER_CLUSTER + aff0
}

// ============================================================================
// Secure Configuration Register (SCR_EL3)
// ============================================================================

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Scr: u64 {
        /// Lower levels are Non-secure
        const NS = 1 << 0;
        /// IRQs taken to EL3
        const IRQ = 1 << 1;
        /// FIQs taken to EL3
        const FIQ = 1 << 2;
        /// External aborts and SError taken to EL3
        const EA = 1 << 3;
        /// SMC disabled
        const SMD = 1 << 7;
        /// HVC enabled
        const HCE = 1 << 8;
        /// Next lower level is AArch64
        const RW = 1 << 10;
    }
}
