//! Build-time configuration of the monitor image.
//!
//! The exception level is fixed when the image is built (features `el1` and
//! `el3`) and threaded through the dispatcher as an [`ExceptionLevel`] value
//! so host tests can exercise both.

use core::fmt;

use crate::error::BuildConfigurationError;

#[cfg(all(feature = "el1", feature = "el3"))]
compile_error!("features `el1` and `el3` are mutually exclusive; build with --no-default-features --features el1");

#[cfg(not(any(feature = "el1", feature = "el3")))]
compile_error!("no exception level selected; enable feature `el1` or `el3`");

#[cfg(feature = "el1")]
const BUILD_LEVEL_NUMBER: u8 = 1;
#[cfg(not(feature = "el1"))]
const BUILD_LEVEL_NUMBER: u8 = 3;

/// Exception level this image was built for.
pub const BUILD_LEVEL: ExceptionLevel = match ExceptionLevel::from_number(BUILD_LEVEL_NUMBER) {
    Ok(level) => level,
    Err(_) => panic!("monitor image must run at EL1 or EL3"),
};

// ============================================================================
// Platform constants (QEMU virt)
// ============================================================================

/// Cores per cluster (MPIDR_EL1.Aff0 range in use).
pub const CPUS_PER_CLUSTER: usize = 4;

/// Maximum number of cores with their own dispatcher, across all clusters.
pub const MAX_CPUS: usize = 8;

/// PL011 UART base address.
pub const UART_BASE: u64 = 0x0900_0000;

/// GICv2 CPU interface base address.
pub const GICC_BASE: u64 = 0x0801_0000;

/// Applet slots hosted by the CUSTOM entity.
pub const MAX_APPLETS: usize = 8;

/// Exception level the monitor executes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionLevel {
    El1,
    El3,
}

/// Names of the system registers the vector stubs and drivers touch at a
/// given level.
#[derive(Debug, PartialEq, Eq)]
pub struct RegisterAliases {
    pub vbar: &'static str,
    pub elr: &'static str,
    pub spsr: &'static str,
    pub esr: &'static str,
    /// Secure configuration register; EL1 has none.
    pub scr: Option<&'static str>,
    pub sp_lower: &'static str,
}

static EL1_REGISTERS: RegisterAliases = RegisterAliases {
    vbar: "vbar_el1",
    elr: "elr_el1",
    spsr: "spsr_el1",
    esr: "esr_el1",
    scr: None,
    sp_lower: "sp_el0",
};

static EL3_REGISTERS: RegisterAliases = RegisterAliases {
    vbar: "vbar_el3",
    elr: "elr_el3",
    spsr: "spsr_el3",
    esr: "esr_el3",
    scr: Some("scr_el3"),
    sp_lower: "sp_el0",
};

impl ExceptionLevel {
    pub const fn from_number(level: u8) -> Result<Self, BuildConfigurationError> {
        match level {
            1 => Ok(Self::El1),
            3 => Ok(Self::El3),
            requested => Err(BuildConfigurationError { requested }),
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::El1 => 1,
            Self::El3 => 3,
        }
    }

    pub fn registers(self) -> &'static RegisterAliases {
        match self {
            Self::El1 => &EL1_REGISTERS,
            Self::El3 => &EL3_REGISTERS,
        }
    }

    /// Only EL3 owns SCR, so only EL3 can move a core between worlds.
    pub const fn can_switch_worlds(self) -> bool {
        matches!(self, Self::El3)
    }
}

impl fmt::Display for ExceptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EL{}", self.number())
    }
}
