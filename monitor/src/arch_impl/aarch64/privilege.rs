//! AArch64 exception level of a saved context.

use crate::arch_impl::traits::PrivilegeLevel;

use super::constants::{SpsrValue, SPSR};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Aarch64PrivilegeLevel {
    EL0,
    EL1,
    EL2,
    EL3,
}

impl Aarch64PrivilegeLevel {
    /// Decode the level recorded in a saved SPSR.
    ///
    /// AArch32 contexts only reach the monitor from EL0 or EL1; any
    /// non-user AArch32 mode is reported as EL1.
    pub fn from_spsr(spsr: u64) -> Self {
        let spsr = SpsrValue::new(spsr);
        if spsr.is_set(SPSR::AARCH32) {
            return if spsr.read(SPSR::M) == 0 { Self::EL0 } else { Self::EL1 };
        }
        match spsr.read(SPSR::M) >> 2 {
            0 => Self::EL0,
            1 => Self::EL1,
            2 => Self::EL2,
            _ => Self::EL3,
        }
    }
}

impl PrivilegeLevel for Aarch64PrivilegeLevel {
    fn user() -> Self {
        Aarch64PrivilegeLevel::EL0
    }

    fn is_user(&self) -> bool {
        matches!(self, Aarch64PrivilegeLevel::EL0)
    }

    fn number(&self) -> u8 {
        match self {
            Self::EL0 => 0,
            Self::EL1 => 1,
            Self::EL2 => 2,
            Self::EL3 => 3,
        }
    }
}
