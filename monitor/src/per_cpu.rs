//! Per-core dispatchers.
//!
//! Each core owns one [`Dispatcher`] behind its own lock. Trap context takes
//! the lock with `try_lock`: a core that finds its own dispatcher locked is
//! re-entering the monitor, and the trap is resolved by
//! [`reject_nested`] instead of waiting forever.

use conquer_once::spin::OnceCell;
use log::info;
use spin::Mutex;

use crate::arch_impl::aarch64::{ExceptionContext, Gicv2CpuInterface, VectorTag};
use crate::config::{ExceptionLevel, GICC_BASE, MAX_CPUS};
use crate::dispatcher::{reject_nested, Dispatcher, TrapOutcome};
use crate::entity::SecureEntityTable;
use crate::error::FatalTrapError;
use crate::payload::custom::Applet;

/// Read-only after `init`; shared by every core.
static ENTITY_TABLE: OnceCell<SecureEntityTable> = OnceCell::uninit();

/// Banked per core by the GIC, so one instance serves every core.
static GIC: Gicv2CpuInterface = Gicv2CpuInterface::new(GICC_BASE);

#[allow(clippy::declare_interior_mutable_const)]
const NO_DISPATCHER: Mutex<Option<Dispatcher<'static>>> = Mutex::new(None);

static DISPATCHERS: [Mutex<Option<Dispatcher<'static>>>; MAX_CPUS] = [NO_DISPATCHER; MAX_CPUS];

/// Build the entity table and one dispatcher per core.
///
/// Runs once on the primary core before any vector table is installed.
pub fn init(level: ExceptionLevel) {
    let table = ENTITY_TABLE.get_or_init(SecureEntityTable::new);
    for slot in DISPATCHERS.iter() {
        *slot.lock() = Some(Dispatcher::new(level, table, &GIC));
    }
    info!(
        "monitor at {} ready for {} cores, vectors via {}",
        level,
        MAX_CPUS,
        level.registers().vbar
    );
    for (oen, entity) in table.entries() {
        info!("  OEN {:#04x}: {}", oen.0, entity);
    }
}

/// Register an applet on every core; returns the CUSTOM function number
/// that invokes it.
pub fn register_applet(applet: Applet) -> Option<u16> {
    let mut number = None;
    for slot in DISPATCHERS.iter() {
        let mut guard = slot.lock();
        let dispatcher = guard.as_mut()?;
        number = dispatcher.payloads_mut().custom.register(applet);
    }
    if let Some(number) = number {
        info!("applet {} at {:#x}", number, applet.entry);
    }
    number
}

/// Hand a trap on `core` to that core's dispatcher.
pub fn handle_trap(
    core: usize,
    tag: VectorTag,
    ctx: &mut ExceptionContext,
) -> Result<TrapOutcome, FatalTrapError> {
    let slot = DISPATCHERS.get(core).ok_or(FatalTrapError::UnknownCore(core))?;
    match slot.try_lock() {
        Some(mut guard) => match guard.as_mut() {
            Some(dispatcher) => dispatcher.handle_trap(tag, ctx),
            None => Err(FatalTrapError::Uninitialized),
        },
        None => reject_nested(tag, ctx, &GIC),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch_impl::aarch64::constants::exception_class;
    use crate::arch_impl::aarch64::{VectorClass, VectorSource};
    use crate::dispatcher::DispatchState;
    use crate::error::SmcError;
    use crate::payload::CompletionEvent;

    // The statics are shared by every test in this binary, so the whole
    // lifecycle is exercised in one test.
    #[test]
    fn test_per_core_dispatch() {
        let tag = VectorTag::new(VectorSource::LowerAarch64, VectorClass::Synchronous);
        let mut ctx = ExceptionContext::new();
        ctx.esr = u64::from(exception_class::SMC_AARCH64) << 26;
        ctx.regs[0] = 0xf200_0000;

        assert_eq!(handle_trap(0, tag, &mut ctx), Err(FatalTrapError::Uninitialized));

        init(ExceptionLevel::El3);
        assert_eq!(
            handle_trap(1, tag, &mut ctx),
            Ok(TrapOutcome::Completed(CompletionEvent::EntryDone))
        );
        assert_eq!(
            handle_trap(MAX_CPUS, tag, &mut ctx),
            Err(FatalTrapError::UnknownCore(MAX_CPUS))
        );

        let applet = Applet {
            entry: 0x0e20_0000,
            stack: 0x0e30_0000,
        };
        assert_eq!(register_applet(applet), Some(1));

        // A core re-entering while its dispatcher is locked gets BUSY
        let guard = DISPATCHERS[2].lock();
        assert_eq!(guard.as_ref().map(|d| d.state()), Some(DispatchState::Idle));
        ctx.regs[0] = 0xf200_0000;
        assert_eq!(
            handle_trap(2, tag, &mut ctx),
            Ok(TrapOutcome::Rejected(SmcError::Busy))
        );
        drop(guard);
    }
}
