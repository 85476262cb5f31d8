//! Saved monitor context.
//!
//! `vectors.S` builds this frame on the monitor stack for every trap and
//! restores it on the way out, so whatever the dispatcher leaves here is
//! where the core resumes. The offsets are handed to the assembler as
//! `const` operands and checked against the struct below at compile time.

use core::mem::{offset_of, size_of};

use crate::arch_impl::traits::InterruptFrame;
use crate::config::ExceptionLevel;
use crate::mem;

use super::constants::{exception_class_of, returns_to_el1h, spsr_el1h_masked, Scr};
use super::privilege::Aarch64PrivilegeLevel;

pub const OFFSET_ELR: usize = 0;
pub const OFFSET_SPSR: usize = 8;
pub const OFFSET_SCR: usize = 16;
pub const OFFSET_ESR: usize = 24;
pub const OFFSET_REGS: usize = 32;
pub const OFFSET_SP_LOWER: usize = 280;
pub const OFFSET_SP_EL1: usize = 288;
pub const FRAME_SIZE: usize = 304;

/// x0 through x30.
pub const GP_REGS: usize = 31;

const FRAME_WORDS: usize = FRAME_SIZE / 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ExceptionContext {
    /// Return address (ELR_ELx)
    pub elr: u64,
    /// Saved PSTATE (SPSR_ELx)
    pub spsr: u64,
    /// SCR_EL3 at trap time; zero at EL1
    pub scr: u64,
    /// Syndrome (ESR_ELx)
    pub esr: u64,
    pub regs: [u64; GP_REGS],
    /// SP_EL0 of the interrupted context
    pub sp_lower: u64,
    /// SP_EL1 at trap time (EL3 only). EL1 state is shared by both worlds,
    /// so it travels with the frame across a world switch.
    pub sp_el1: u64,
    reserved: u64,
}

const _: () = assert!(offset_of!(ExceptionContext, elr) == OFFSET_ELR);
const _: () = assert!(offset_of!(ExceptionContext, spsr) == OFFSET_SPSR);
const _: () = assert!(offset_of!(ExceptionContext, scr) == OFFSET_SCR);
const _: () = assert!(offset_of!(ExceptionContext, esr) == OFFSET_ESR);
const _: () = assert!(offset_of!(ExceptionContext, regs) == OFFSET_REGS);
const _: () = assert!(offset_of!(ExceptionContext, sp_lower) == OFFSET_SP_LOWER);
const _: () = assert!(offset_of!(ExceptionContext, sp_el1) == OFFSET_SP_EL1);
const _: () = assert!(size_of::<ExceptionContext>() == FRAME_SIZE);
// AAPCS64 stack alignment
const _: () = assert!(FRAME_SIZE % 16 == 0);

/// Security state of the context a frame returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum World {
    Secure,
    NonSecure,
}

impl ExceptionContext {
    pub const fn new() -> Self {
        Self {
            elr: 0,
            spsr: 0,
            scr: 0,
            esr: 0,
            regs: [0; GP_REGS],
            sp_lower: 0,
            sp_el1: 0,
            reserved: 0,
        }
    }

    /// Function identifier of an SMC (w0/x0).
    #[inline]
    pub fn smc_function(&self) -> u64 {
        self.regs[0]
    }

    /// Argument register `n`; out-of-range indices read as zero.
    #[inline]
    pub fn arg(&self, n: usize) -> u64 {
        self.regs.get(n).copied().unwrap_or(0)
    }

    /// Write an SMC result: x0 plus up to three result registers.
    pub fn write_return(&mut self, x0: u64, results: [u64; 3]) {
        self.regs[0] = x0;
        self.regs[1..4].copy_from_slice(&results);
    }

    pub fn exception_class(&self) -> u8 {
        exception_class_of(self.esr)
    }

    /// Security state this frame returns to; `None` where the monitor has
    /// no SCR.
    pub fn world(&self, level: ExceptionLevel) -> Option<World> {
        if !level.can_switch_worlds() {
            return None;
        }
        if Scr::from_bits_retain(self.scr).contains(Scr::NS) {
            Some(World::NonSecure)
        } else {
            Some(World::Secure)
        }
    }

    pub fn set_world(&mut self, world: World) {
        let mut scr = Scr::from_bits_retain(self.scr);
        scr.set(Scr::NS, world == World::NonSecure);
        self.scr = scr.bits();
    }

    /// Fresh frame entering `world` at EL1h on `stack`, keeping this frame's
    /// SCR routing controls.
    pub fn entering(&self, world: World, entry: u64, stack: u64) -> Self {
        let mut next = Self::new();
        next.elr = entry;
        next.spsr = spsr_el1h_masked();
        next.scr = self.scr;
        next.sp_el1 = stack;
        next.set_world(world);
        next
    }

    fn words(&self) -> [u64; FRAME_WORDS] {
        let mut words = [0u64; FRAME_WORDS];
        words[0] = self.elr;
        words[1] = self.spsr;
        words[2] = self.scr;
        words[3] = self.esr;
        words[4..4 + GP_REGS].copy_from_slice(&self.regs);
        words[OFFSET_SP_LOWER / 8] = self.sp_lower;
        words[OFFSET_SP_EL1 / 8] = self.sp_el1;
        words
    }

    /// Byte image of the frame exactly as the vector stubs lay it out.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        for (chunk, word) in out.chunks_exact_mut(8).zip(self.words()) {
            mem::copy(chunk, &word.to_ne_bytes());
        }
        out
    }

    /// Parse a frame image; `None` unless exactly `FRAME_SIZE` bytes.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() != FRAME_SIZE {
            return None;
        }
        let mut words = [0u64; FRAME_WORDS];
        for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            mem::copy(&mut bytes, chunk);
            *word = u64::from_ne_bytes(bytes);
        }
        let mut ctx = Self::new();
        ctx.elr = words[0];
        ctx.spsr = words[1];
        ctx.scr = words[2];
        ctx.esr = words[3];
        ctx.regs.copy_from_slice(&words[4..4 + GP_REGS]);
        ctx.sp_lower = words[OFFSET_SP_LOWER / 8];
        ctx.sp_el1 = words[OFFSET_SP_EL1 / 8];
        Some(ctx)
    }
}

impl InterruptFrame for ExceptionContext {
    type Privilege = Aarch64PrivilegeLevel;

    fn instruction_pointer(&self) -> u64 {
        self.elr
    }

    fn stack_pointer(&self) -> u64 {
        if returns_to_el1h(self.spsr) {
            self.sp_el1
        } else {
            self.sp_lower
        }
    }

    fn set_instruction_pointer(&mut self, addr: u64) {
        self.elr = addr;
    }

    fn set_stack_pointer(&mut self, addr: u64) {
        if returns_to_el1h(self.spsr) {
            self.sp_el1 = addr;
        } else {
            self.sp_lower = addr;
        }
    }

    fn privilege_level(&self) -> Self::Privilege {
        Aarch64PrivilegeLevel::from_spsr(self.spsr)
    }
}
