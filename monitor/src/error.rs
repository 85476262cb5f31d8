//! Monitor error taxonomy.
//!
//! Everything a normal-world SMC can trigger degrades to a return code in x0.
//! Only [`FatalTrapError`] ends in a halt.

use core::fmt;

use crate::arch_impl::aarch64::vectors::VectorTag;
use crate::smccc;

/// An exception level other than 1 or 3 was requested for the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfigurationError {
    pub requested: u8,
}

impl fmt::Display for BuildConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "monitor cannot run at EL{} (only EL1 and EL3)", self.requested)
    }
}

/// Why a call identifier or its arguments were rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
    /// Bits [63:32] of the identifier are not zero.
    UpperBitsSet,
    /// Reserved bits in [23:16] are set.
    ReservedBitsSet,
    /// The owning entity has no function with this number.
    UnknownFunction { number: u16 },
    /// A 64-bit call was issued from an AArch32 caller.
    WidthMismatch,
    /// The function only exists as the other call type.
    CallTypeMismatch,
    /// An argument register holds a value the function cannot accept.
    InvalidArgument,
}

/// Why a well-formed call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The payload's CPU lifecycle does not allow the requested transition.
    LifecycleState,
    /// Abort requested with no preempted call outstanding.
    NoPreemptedCall,
    /// A world switch was requested from a monitor without SCR access.
    WorldSwitchUnavailable,
    /// Return to a parked context requested but nothing is parked.
    NoParkedContext,
    /// The addressed applet slot is empty.
    AppletNotRegistered,
    /// The call is not allowed from the caller's security state.
    CallerWorld,
}

/// A rejected SMC. Recovered locally as an error completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmcError {
    UnrecognizedEntity { oen: u8 },
    MalformedCall(Malformation),
    Busy,
    Denied(DenyReason),
}

impl SmcError {
    /// SMCCC-style return code reported to the caller.
    pub const fn return_code(self) -> i32 {
        match self {
            Self::UnrecognizedEntity { .. } => smccc::NOT_SUPPORTED,
            Self::MalformedCall(_) => smccc::INVALID_PARAMETER,
            Self::Busy => smccc::BUSY,
            Self::Denied(_) => smccc::DENIED,
        }
    }

    /// Return code as written to x0 (sign-extended).
    pub const fn return_value(self) -> u64 {
        self.return_code() as i64 as u64
    }
}

impl fmt::Display for SmcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnrecognizedEntity { oen } => write!(f, "no secure entity owns OEN {:#x}", oen),
            Self::MalformedCall(why) => write!(f, "malformed call: {:?}", why),
            Self::Busy => write!(f, "monitor busy"),
            Self::Denied(why) => write!(f, "denied: {:?}", why),
        }
    }
}

/// A trap the monitor cannot return from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalTrapError {
    /// Trap taken on a vector with no usable stack (current EL, SP0).
    UnrecoverableVector(VectorTag),
    /// Synchronous trap that is not an SMC, or the monitor faulting on itself.
    UnexpectedSync { tag: VectorTag, ec: u8 },
    /// The vector stub passed a tag outside the 16 known entries.
    UnknownVector(u64),
    /// Trap on a core index beyond `MAX_CPUS`.
    UnknownCore(usize),
    /// Trap before `per_cpu::init` ran.
    Uninitialized,
    /// The core already halted.
    Halted,
}

impl fmt::Display for FatalTrapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnrecoverableVector(tag) => write!(f, "unrecoverable exception vector {}", tag),
            Self::UnexpectedSync { tag, ec } => {
                write!(f, "unexpected synchronous exception EC={:#x} on {}", ec, tag)
            }
            Self::UnknownVector(raw) => write!(f, "unknown vector tag {:#x}", raw),
            Self::UnknownCore(core) => write!(f, "trap on unknown core {}", core),
            Self::Uninitialized => write!(f, "trap before monitor initialization"),
            Self::Halted => write!(f, "core already halted"),
        }
    }
}
