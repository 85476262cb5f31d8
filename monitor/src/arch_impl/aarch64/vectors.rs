//! Monitor exception vector table.
//!
//! Sixteen entries, four sources by four classes, in the architectural
//! order. Each stub in `vectors.S` saves an [`ExceptionContext`], loads its
//! tag into x1 and calls `monitor_handle_trap`.
//!
//! A tag is `(source << 4) | (class + 1)`, so 0x01 is a synchronous trap on
//! the current EL with SP0 and 0x34 an SError from lower-EL AArch32.
//!
//! [`ExceptionContext`]: super::exception_frame::ExceptionContext

use core::fmt;

/// Bytes per vector entry.
pub const VECTOR_ENTRY_SIZE: usize = 0x80;

/// Entries in the table.
pub const VECTOR_COUNT: usize = 16;

/// Required alignment of the table base (VBAR low bits are RES0).
pub const VECTOR_TABLE_ALIGN: usize = 0x800;

const _: () = assert!(VECTOR_ENTRY_SIZE * VECTOR_COUNT == VECTOR_TABLE_ALIGN);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSource {
    /// Current EL, SP_EL0 selected
    CurrentSp0,
    /// Current EL, SP_ELx selected
    CurrentSpx,
    LowerAarch64,
    LowerAarch32,
}

impl VectorSource {
    pub const ALL: [Self; 4] = [
        Self::CurrentSp0,
        Self::CurrentSpx,
        Self::LowerAarch64,
        Self::LowerAarch32,
    ];

    const fn index(self) -> u64 {
        match self {
            Self::CurrentSp0 => 0,
            Self::CurrentSpx => 1,
            Self::LowerAarch64 => 2,
            Self::LowerAarch32 => 3,
        }
    }

    /// Trap came from a lower exception level.
    pub const fn is_lower(self) -> bool {
        matches!(self, Self::LowerAarch64 | Self::LowerAarch32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorClass {
    Synchronous,
    Irq,
    Fiq,
    SError,
}

impl VectorClass {
    pub const ALL: [Self; 4] = [Self::Synchronous, Self::Irq, Self::Fiq, Self::SError];

    const fn index(self) -> u64 {
        match self {
            Self::Synchronous => 0,
            Self::Irq => 1,
            Self::Fiq => 2,
            Self::SError => 3,
        }
    }
}

/// Identifies which of the 16 vectors fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTag {
    pub source: VectorSource,
    pub class: VectorClass,
}

impl VectorTag {
    pub const fn new(source: VectorSource, class: VectorClass) -> Self {
        Self { source, class }
    }

    /// Value the stub loads into x1.
    pub const fn raw(self) -> u64 {
        (self.source.index() << 4) | (self.class.index() + 1)
    }

    pub const fn from_raw(raw: u64) -> Option<Self> {
        let source = match raw >> 4 {
            0 => VectorSource::CurrentSp0,
            1 => VectorSource::CurrentSpx,
            2 => VectorSource::LowerAarch64,
            3 => VectorSource::LowerAarch32,
            _ => return None,
        };
        let class = match raw & 0xf {
            1 => VectorClass::Synchronous,
            2 => VectorClass::Irq,
            3 => VectorClass::Fiq,
            4 => VectorClass::SError,
            _ => return None,
        };
        Some(Self::new(source, class))
    }

    /// Position in the table, 0..16.
    pub const fn slot(self) -> usize {
        (self.source.index() * 4 + self.class.index()) as usize
    }

    /// Byte offset of this entry from the table base.
    pub const fn offset(self) -> usize {
        self.slot() * VECTOR_ENTRY_SIZE
    }

    /// SP0 entries have no monitor stack to run on.
    pub const fn is_recoverable(self) -> bool {
        !matches!(self.source, VectorSource::CurrentSp0)
    }

    /// All sixteen tags in table order.
    pub fn all() -> impl Iterator<Item = Self> {
        VectorSource::ALL
            .into_iter()
            .flat_map(|source| VectorClass::ALL.into_iter().map(move |class| Self::new(source, class)))
    }
}

impl fmt::Display for VectorTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let class = match self.class {
            VectorClass::Synchronous => "sync",
            VectorClass::Irq => "irq",
            VectorClass::Fiq => "fiq",
            VectorClass::SError => "serror",
        };
        let source = match self.source {
            VectorSource::CurrentSp0 => "current EL SP0",
            VectorSource::CurrentSpx => "current EL SPx",
            VectorSource::LowerAarch64 => "lower EL AArch64",
            VectorSource::LowerAarch32 => "lower EL AArch32",
        };
        write!(f, "{} from {} (tag {:#04x})", class, source, self.raw())
    }
}

#[cfg(target_arch = "aarch64")]
mod table {
    use core::arch::global_asm;

    use super::super::exception_frame::{
        FRAME_SIZE, OFFSET_ELR, OFFSET_REGS, OFFSET_SCR, OFFSET_SP_EL1, OFFSET_SP_LOWER,
    };
    use crate::config::BUILD_LEVEL;

    global_asm!(
        include_str!("vectors.S"),
        el = const BUILD_LEVEL.number(),
        frame_size = const FRAME_SIZE,
        offset_elr = const OFFSET_ELR,
        offset_scr = const OFFSET_SCR,
        offset_regs = const OFFSET_REGS,
        offset_sp_lower = const OFFSET_SP_LOWER,
        offset_sp_el1 = const OFFSET_SP_EL1,
    );

    extern "C" {
        static monitor_vector_table: u8;
    }

    /// Address to program into VBAR.
    pub fn base() -> u64 {
        // SAFETY: only the address of the assembler symbol is taken.
        unsafe { core::ptr::addr_of!(monitor_vector_table) as u64 }
    }
}

#[cfg(target_arch = "aarch64")]
pub use table::base as table_base;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_cover_table_once() {
        let tags: Vec<VectorTag> = VectorTag::all().collect();
        assert_eq!(tags.len(), VECTOR_COUNT);
        for (slot, tag) in tags.iter().enumerate() {
            assert_eq!(tag.slot(), slot);
            assert_eq!(VectorTag::from_raw(tag.raw()), Some(*tag));
        }
        assert_eq!(tags[0].raw(), 0x01);
        assert_eq!(tags[VECTOR_COUNT - 1].raw(), 0x34);
    }

    #[test]
    fn test_lower_aarch64_sync_entry() {
        let tag = VectorTag::new(VectorSource::LowerAarch64, VectorClass::Synchronous);
        assert_eq!(tag.raw(), 0x21);
        assert_eq!(tag.offset(), 0x400);
        assert!(tag.is_recoverable());
        assert!(tag.source.is_lower());
    }

    #[test]
    fn test_invalid_raw_tags() {
        for raw in [0x00, 0x05, 0x10, 0x20, 0x35, 0x41, u64::MAX] {
            assert_eq!(VectorTag::from_raw(raw), None, "raw {:#x}", raw);
        }
    }

    #[test]
    fn test_only_sp0_is_unrecoverable() {
        for tag in VectorTag::all() {
            assert_eq!(tag.is_recoverable(), tag.source != VectorSource::CurrentSp0);
        }
    }

    #[test]
    fn test_sp0_stubs_leave_sp_el0_before_building_frame() {
        let source = include_str!("vectors.S");
        for tag in VectorTag::all() {
            let sp0_stub = format!("vector_entry_sp0 {:#04x}", tag.raw());
            assert_eq!(
                source.contains(&sp0_stub),
                tag.source == VectorSource::CurrentSp0,
                "{}",
                tag
            );
        }

        let stub = source
            .split(".macro vector_entry_sp0")
            .nth(1)
            .and_then(|rest| rest.split(".endm").next())
            .unwrap();
        let select = stub.find("msr     spsel, #1").unwrap();
        let reserve = stub.find("sub     sp, sp, #FRAME_SIZE").unwrap();
        assert!(select < reserve);
    }
}
