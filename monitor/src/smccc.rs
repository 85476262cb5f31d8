//! SMC Calling Convention function identifiers and return codes.
//!
//! ```text
//!  31   30   29..24  23..17   16    15..0
//! Fast  64   OEN     reserved SVE   function number
//! ```

use core::fmt;

use crate::entity::{OwningEntityNumber, SecureEntity, SecureEntityTable};
use crate::error::{Malformation, SmcError};

const FAST_CALL: u64 = 1 << 31;
const SMC64: u64 = 1 << 30;
const OEN_SHIFT: u32 = 24;
const FUNCTION_MASK: u64 = 0xffff;
/// Fast calls use bit 16 as the SVE live-state hint.
const SVE_HINT: u64 = 1 << 16;
const RESERVED_MASK: u64 = 0x7f << 17;
const UPPER_MASK: u64 = 0xffff_ffff << 32;

pub const SUCCESS: i32 = 0;
pub const NOT_SUPPORTED: i32 = -1;
pub const NOT_REQUIRED: i32 = -2;
pub const INVALID_PARAMETER: i32 = -3;
/// The monitor is already handling a trap on this core.
pub const BUSY: i32 = -4;
/// Well-formed call refused in the current state.
pub const DENIED: i32 = -5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Yielding,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallWidth {
    Smc32,
    Smc64,
}

/// A decoded SMC function identifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SmcFunctionId {
    pub call_type: CallType,
    pub width: CallWidth,
    pub owning_entity: SecureEntity,
    pub function_number: u16,
}

impl SmcFunctionId {
    pub const fn new(
        call_type: CallType,
        width: CallWidth,
        owning_entity: SecureEntity,
        function_number: u16,
    ) -> Self {
        Self {
            call_type,
            width,
            owning_entity,
            function_number,
        }
    }

    pub const fn encode(&self) -> u64 {
        let call_type = match self.call_type {
            CallType::Fast => FAST_CALL,
            CallType::Yielding => 0,
        };
        let width = match self.width {
            CallWidth::Smc64 => SMC64,
            CallWidth::Smc32 => 0,
        };
        call_type
            | width
            | ((self.owning_entity.oen().0 as u64) << OEN_SHIFT)
            | self.function_number as u64
    }
}

impl fmt::Debug for SmcFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:#010x} ({:?} {:?} {} #{:#x})",
            self.encode(),
            self.call_type,
            self.width,
            self.owning_entity,
            self.function_number
        )
    }
}

impl fmt::Display for SmcFunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.encode())
    }
}

/// Owning entity number carried in a raw identifier.
pub const fn owning_entity_number(raw: u64) -> OwningEntityNumber {
    OwningEntityNumber(((raw >> OEN_SHIFT) as u8) & OwningEntityNumber::MASK)
}

/// Decode a raw x0 value against `table`.
pub fn decode(raw: u64, table: &SecureEntityTable) -> Result<SmcFunctionId, SmcError> {
    if raw & UPPER_MASK != 0 {
        return Err(SmcError::MalformedCall(Malformation::UpperBitsSet));
    }
    let call_type = if raw & FAST_CALL != 0 {
        CallType::Fast
    } else {
        CallType::Yielding
    };
    let reserved = match call_type {
        CallType::Fast => RESERVED_MASK,
        CallType::Yielding => RESERVED_MASK | SVE_HINT,
    };
    if raw & reserved != 0 {
        return Err(SmcError::MalformedCall(Malformation::ReservedBitsSet));
    }
    let oen = owning_entity_number(raw);
    let owning_entity = table
        .lookup(oen)
        .ok_or(SmcError::UnrecognizedEntity { oen: oen.0 })?;
    let width = if raw & SMC64 != 0 {
        CallWidth::Smc64
    } else {
        CallWidth::Smc32
    };
    Ok(SmcFunctionId::new(
        call_type,
        width,
        owning_entity,
        (raw & FUNCTION_MASK) as u16,
    ))
}

pub fn encode(id: &SmcFunctionId) -> u64 {
    id.encode()
}
