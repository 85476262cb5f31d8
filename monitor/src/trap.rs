//! Trap entry from the vector stubs.
//!
//! `vectors.S` calls [`monitor_handle_trap`] with the saved frame and the
//! vector tag. Recoverable traps return normally and the stub erets through
//! the (possibly rewritten) frame; fatal ones never return.

use log::error;

use crate::arch_impl::aarch64::constants::exception_class;
use crate::arch_impl::aarch64::{Aarch64PrivilegeLevel, ExceptionContext};
use crate::arch_impl::PrivilegeLevel;
use crate::error::FatalTrapError;

/// Log everything known about a fatal trap. The frame is left untouched.
pub fn report(err: &FatalTrapError, ctx: &ExceptionContext) {
    let ec = ctx.exception_class();
    error!("FATAL: {}", err);
    error!(
        "  ELR={:#018x} SPSR={:#x} (EL{}) SCR={:#x}",
        ctx.elr,
        ctx.spsr,
        Aarch64PrivilegeLevel::from_spsr(ctx.spsr).number(),
        ctx.scr
    );
    error!("  ESR={:#x} EC={:#x} ({})", ctx.esr, ec, exception_class::name(ec));
    for (i, pair) in ctx.regs[..8].chunks(2).enumerate() {
        error!("  x{:<2}={:#018x} x{:<2}={:#018x}", i * 2, pair[0], i * 2 + 1, pair[1]);
    }
    error!("  SP_EL0={:#018x} SP_EL1={:#018x}", ctx.sp_lower, ctx.sp_el1);
}

/// Called from `monitor_trap_common` with x0 = frame, x1 = tag.
#[cfg(target_arch = "aarch64")]
#[no_mangle]
pub extern "C" fn monitor_handle_trap(frame: *mut ExceptionContext, tag: u64) {
    use crate::arch_impl::aarch64::{Aarch64Cpu, VectorTag};
    use crate::arch_impl::CpuOps;

    // SAFETY: the stub passes the frame it just built on this core's stack.
    let ctx = unsafe { &mut *frame };
    let result = VectorTag::from_raw(tag)
        .ok_or(FatalTrapError::UnknownVector(tag))
        .and_then(|tag| crate::per_cpu::handle_trap(Aarch64Cpu::current_core(), tag, ctx));

    if let Err(err) = result {
        // SAFETY: nothing on this core runs after the halt.
        unsafe { Aarch64Cpu::mask_all() };
        report(&err, ctx);
        loop {
            Aarch64Cpu::halt();
        }
    }
}
