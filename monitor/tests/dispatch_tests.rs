//! End-to-end dispatch through the public monitor API.
//!
//! Each test builds a saved frame the way the vector stubs would, runs it
//! through a dispatcher and checks the frame the core would `eret` with.

use std::sync::atomic::{AtomicU32, Ordering};

use monitor::arch_impl::aarch64::constants::{exception_class, Scr};
use monitor::arch_impl::aarch64::{
    Aarch64PrivilegeLevel, ExceptionContext, VectorClass, VectorSource, VectorTag, World,
};
use monitor::arch_impl::{InterruptController, InterruptFrame};
use monitor::config::ExceptionLevel;
use monitor::dispatcher::{DispatchState, Dispatcher, TrapOutcome};
use monitor::entity::{SecureEntity, SecureEntityTable};
use monitor::error::{DenyReason, FatalTrapError, Malformation, SmcError};
use monitor::payload::custom::Applet;
use monitor::payload::tsp::CpuLifecycle;
use monitor::payload::CompletionEvent;
use monitor::smccc::{
    self, CallType, CallWidth, SmcFunctionId, DENIED, INVALID_PARAMETER, NOT_SUPPORTED,
};

static TABLE: SecureEntityTable = SecureEntityTable::new();
static NO_INTERRUPTS: Interrupts = Interrupts::new();

const LOWER_SYNC: VectorTag = VectorTag::new(VectorSource::LowerAarch64, VectorClass::Synchronous);
const NORMAL_ELR: u64 = 0x4008_1004;

const APPLET: Applet = Applet {
    entry: 0x0e20_0000,
    stack: 0x0e30_0000,
};

/// GIC CPU interface that hands out queued interrupt IDs and records the
/// last end of interrupt.
struct Interrupts {
    next: AtomicU32,
    acknowledged: AtomicU32,
    completed: AtomicU32,
}

impl Interrupts {
    const SPURIOUS: u32 = 1023;

    const fn new() -> Self {
        Self {
            next: AtomicU32::new(Self::SPURIOUS),
            acknowledged: AtomicU32::new(0),
            completed: AtomicU32::new(Self::SPURIOUS),
        }
    }

    fn raise(&self, id: u32) {
        self.next.store(id, Ordering::SeqCst);
    }
}

impl InterruptController for Interrupts {
    fn acknowledge(&self) -> Option<u32> {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        let id = self.next.swap(Self::SPURIOUS, Ordering::SeqCst);
        (id != Self::SPURIOUS).then_some(id)
    }

    fn end_of_interrupt(&self, id: u32) {
        self.completed.store(id, Ordering::SeqCst);
    }
}

fn code(value: i32) -> u64 {
    value as i64 as u64
}

fn fid(call_type: CallType, width: CallWidth, entity: SecureEntity, number: u16) -> u64 {
    SmcFunctionId::new(call_type, width, entity, number).encode()
}

/// Frame for an SMC issued by the normal world at EL1.
fn smc_frame(raw: u64, args: &[u64]) -> ExceptionContext {
    let mut ctx = ExceptionContext::new();
    ctx.elr = NORMAL_ELR;
    ctx.spsr = 0x3c5;
    ctx.scr = (Scr::NS | Scr::RW).bits();
    ctx.esr = u64::from(exception_class::SMC_AARCH64) << 26;
    ctx.sp_lower = 0x4010_0000;
    ctx.sp_el1 = 0x4018_0000;
    ctx.regs[0] = raw;
    ctx.regs[1..=args.len()].copy_from_slice(args);
    ctx.regs[19] = 0x1919;
    ctx
}

fn el3() -> Dispatcher<'static> {
    Dispatcher::new(ExceptionLevel::El3, &TABLE, &NO_INTERRUPTS)
}

#[test]
fn test_suspend_resumes_at_requested_entry() {
    let mut dispatcher = el3();
    let raw = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 5);
    let mut ctx = smc_frame(raw, &[0x8000_2000]);

    let outcome = dispatcher.handle_trap(LOWER_SYNC, &mut ctx);

    assert_eq!(outcome, Ok(TrapOutcome::Completed(CompletionEvent::SuspendDone)));
    assert_eq!(ctx.regs[0], 0xf200_0003);
    assert_eq!(ctx.elr, 0x8000_2000);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
    assert_eq!(dispatcher.payloads().tsp.lifecycle(), CpuLifecycle::Suspended);
}

#[test]
fn test_unmapped_entity_is_not_supported() {
    let mut dispatcher = el3();
    let raw = (1 << 31) | (1 << 30) | (0x01 << 24);
    let mut ctx = smc_frame(raw, &[1, 2, 3]);

    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::UnrecognizedEntity { oen: 0x01 }))
    );
    assert_eq!(ctx.regs[0], code(NOT_SUPPORTED));
    assert_eq!(&ctx.regs[1..4], &[0, 0, 0]);
    assert_eq!(ctx.elr, NORMAL_ELR);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

#[test]
fn test_unknown_tsp_function_is_malformed() {
    let mut dispatcher = el3();
    let raw = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 0x1234);
    let mut ctx = smc_frame(raw, &[]);

    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::MalformedCall(
            Malformation::UnknownFunction { number: 0x1234 }
        )))
    );
    assert_eq!(ctx.regs[0], code(INVALID_PARAMETER));
    assert_eq!(dispatcher.payloads().tsp.lifecycle(), CpuLifecycle::On);
}

#[test]
fn test_sp0_trap_halts_regardless_of_content() {
    let mut dispatcher = el3();
    let raw = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 0);
    let tag = VectorTag::new(VectorSource::CurrentSp0, VectorClass::Synchronous);
    let mut ctx = smc_frame(raw, &[]);
    let before = ctx;

    assert_eq!(
        dispatcher.handle_trap(tag, &mut ctx),
        Err(FatalTrapError::UnrecoverableVector(tag))
    );
    assert_eq!(ctx, before);
    assert_eq!(dispatcher.state(), DispatchState::Halted);

    let mut next = smc_frame(raw, &[]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut next),
        Err(FatalTrapError::Halted)
    );
}

#[test]
fn test_interrupts_are_acknowledged_and_frame_untouched() {
    let gic = Interrupts::new();
    let mut dispatcher = Dispatcher::new(ExceptionLevel::El3, &TABLE, &gic);
    let mut ctx = smc_frame(0, &[]);
    let before = ctx;

    for (class, id) in [(VectorClass::Irq, 27), (VectorClass::Fiq, 29)] {
        gic.raise(id);
        let tag = VectorTag::new(VectorSource::LowerAarch64, class);
        assert_eq!(dispatcher.handle_trap(tag, &mut ctx), Ok(TrapOutcome::Forwarded(class)));
        assert_eq!(gic.completed.load(Ordering::SeqCst), id);
        assert_eq!(ctx, before);
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }
    assert_eq!(gic.acknowledged.load(Ordering::SeqCst), 2);

    let serror = VectorTag::new(VectorSource::LowerAarch64, VectorClass::SError);
    assert_eq!(
        dispatcher.handle_trap(serror, &mut ctx),
        Ok(TrapOutcome::Forwarded(VectorClass::SError))
    );
    assert_eq!(gic.acknowledged.load(Ordering::SeqCst), 2);
    assert_eq!(ctx, before);
}

#[test]
fn test_non_smc_sync_from_lower_el_is_fatal() {
    let mut dispatcher = el3();
    let mut ctx = smc_frame(0, &[]);
    ctx.esr = u64::from(exception_class::SVC_AARCH64) << 26;
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Err(FatalTrapError::UnexpectedSync {
            tag: LOWER_SYNC,
            ec: exception_class::SVC_AARCH64
        })
    );
}

#[test]
fn test_aarch32_caller_cannot_issue_smc64() {
    let mut dispatcher = el3();
    let tag = VectorTag::new(VectorSource::LowerAarch32, VectorClass::Synchronous);
    let mut ctx = smc_frame(fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 0), &[]);
    ctx.esr = u64::from(exception_class::SMC_AARCH32) << 26;
    assert_eq!(
        dispatcher.handle_trap(tag, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::MalformedCall(Malformation::WidthMismatch)))
    );

    let mut ctx = smc_frame(fid(CallType::Fast, CallWidth::Smc32, SecureEntity::Tsp, 0), &[]);
    ctx.esr = u64::from(exception_class::SMC_AARCH32) << 26;
    assert_eq!(
        dispatcher.handle_trap(tag, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::EntryDone))
    );
}

#[test]
fn test_tsp_arithmetic_results_in_x1() {
    let mut dispatcher = el3();
    let add = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 0x2000);
    let mut ctx = smc_frame(add, &[40, 2]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::EntryDone))
    );
    assert_eq!(&ctx.regs[..3], &[0xf200_0000, 42, 0]);
    assert_eq!(ctx.regs[19], 0x1919);

    let div = fid(CallType::Fast, CallWidth::Smc32, SecureEntity::Tsp, 0x2003);
    let mut ctx = smc_frame(div, &[7, 0]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::MalformedCall(Malformation::InvalidArgument)))
    );
    assert_eq!(ctx.regs[0], code(INVALID_PARAMETER));
}

#[test]
fn test_tsp_lifecycle_checks() {
    let mut dispatcher = el3();
    let tsp = |number| fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, number);

    let mut ctx = smc_frame(tsp(1), &[0x8000_0000]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::Denied(DenyReason::LifecycleState)))
    );
    assert_eq!(ctx.regs[0], code(DENIED));
    assert_eq!(ctx.elr, NORMAL_ELR);

    let mut ctx = smc_frame(tsp(2), &[]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::OffDone))
    );

    let mut ctx = smc_frame(tsp(1), &[0x8000_0000]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::OnDone))
    );
    assert_eq!(ctx.elr, 0x8000_0000);
    assert_eq!(ctx.regs[0], 0xf200_0001);
}

#[test]
fn test_optee_revision_and_message_calls() {
    let mut dispatcher = el3();
    let revision = fid(CallType::Fast, CallWidth::Smc32, SecureEntity::OpTee, 0xff03);
    let mut ctx = smc_frame(revision, &[]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::OpTeeEntryDone))
    );
    assert_eq!(&ctx.regs[..3], &[0xbe00_0000, 2, 0]);

    let fast_call = fid(CallType::Fast, CallWidth::Smc32, SecureEntity::OpTee, 4);
    let mut ctx = smc_frame(fast_call, &[0, 0x4200_0000]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::MalformedCall(Malformation::CallTypeMismatch)))
    );

    let yielding_call = fid(CallType::Yielding, CallWidth::Smc32, SecureEntity::OpTee, 4);
    let mut ctx = smc_frame(yielding_call, &[0, 0x4200_0000]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::OpTeeEntryDone))
    );
    assert_eq!(dispatcher.payloads().optee.messages(), 1);
}

#[test]
fn test_applet_round_trip_restores_caller() {
    let mut dispatcher = el3();
    assert_eq!(dispatcher.payloads_mut().custom.register(APPLET), Some(1));

    let invoke = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Custom, 1);
    let mut ctx = smc_frame(invoke, &[7, 8, 9]);
    let caller = ctx;

    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::CustomEntryDone))
    );
    assert_eq!(ctx.elr, APPLET.entry);
    assert_eq!(ctx.sp_el1, APPLET.stack);
    assert_eq!(ctx.stack_pointer(), APPLET.stack);
    // Secure EL1, where the exit SMC is available to the applet
    assert_eq!(ctx.privilege_level(), Aarch64PrivilegeLevel::EL1);
    assert_eq!(ctx.world(ExceptionLevel::El3), Some(World::Secure));
    assert_eq!(&ctx.regs[..4], &[0xbd00_0000, 7, 8, 9]);
    assert_eq!(ctx.regs[19], 0);
    assert_eq!(dispatcher.parked(), Some(&caller));

    // A second entry while the caller is parked is refused
    let mut nested = ctx;
    nested.esr = u64::from(exception_class::SMC_AARCH64) << 26;
    nested.set_world(World::NonSecure);
    nested.regs[0] = invoke;
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut nested),
        Ok(TrapOutcome::Rejected(SmcError::Busy))
    );

    // The applet finishes with SMC CUSTOM #0. The vector stub saves the
    // frame exactly as the applet left S-EL1h, on its own stack.
    ctx.esr = u64::from(exception_class::SMC_AARCH64) << 26;
    ctx.regs[0] = fid(CallType::Fast, CallWidth::Smc32, SecureEntity::Custom, 0);
    ctx.regs[1] = 42;
    ctx.elr = APPLET.entry + 0x44;
    ctx.sp_el1 = APPLET.stack - 0x40;
    assert_eq!(ctx.privilege_level(), Aarch64PrivilegeLevel::EL1);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::CustomEntryDone))
    );

    let mut expected = caller;
    expected.write_return(0xbd00_0000, [42, 0, 0]);
    assert_eq!(ctx, expected);
    assert_eq!(ctx.sp_el1, caller.sp_el1);
    assert_eq!(ctx.world(ExceptionLevel::El3), Some(World::NonSecure));
    assert_eq!(dispatcher.parked(), None);

    // The slot is free again for the next invocation
    let mut again = smc_frame(invoke, &[1, 2, 3]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut again),
        Ok(TrapOutcome::Completed(CompletionEvent::CustomEntryDone))
    );
    assert_eq!(again.elr, APPLET.entry);
}

#[test]
fn test_applet_exit_without_parked_caller() {
    let mut dispatcher = el3();
    let exit = fid(CallType::Fast, CallWidth::Smc32, SecureEntity::Custom, 0);
    let mut ctx = smc_frame(exit, &[]);
    ctx.set_world(World::Secure);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::Denied(DenyReason::NoParkedContext)))
    );
    assert_eq!(ctx.regs[0], code(DENIED));
}

#[test]
fn test_el1_monitor_refuses_world_switch() {
    let mut dispatcher = Dispatcher::new(ExceptionLevel::El1, &TABLE, &NO_INTERRUPTS);
    dispatcher.payloads_mut().custom.register(APPLET);

    let invoke = fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Custom, 1);
    let mut ctx = smc_frame(invoke, &[7, 8, 9]);
    ctx.scr = 0;
    let before = ctx;

    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Rejected(SmcError::Denied(DenyReason::WorldSwitchUnavailable)))
    );
    assert_eq!(ctx.regs[0], code(DENIED));
    assert_eq!(ctx.elr, before.elr);
    assert_eq!(ctx.sp_lower, before.sp_lower);
    assert_eq!(ctx.sp_el1, before.sp_el1);
    assert_eq!(dispatcher.parked(), None);
    assert_eq!(dispatcher.state(), DispatchState::Idle);

    // Calls that stay in the caller's world still work at EL1
    let mut ctx = smc_frame(fid(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 0), &[]);
    assert_eq!(
        dispatcher.handle_trap(LOWER_SYNC, &mut ctx),
        Ok(TrapOutcome::Completed(CompletionEvent::EntryDone))
    );
}

#[test]
fn test_completion_codes_decode_as_expected() {
    let suspend_done = smccc::decode(u64::from(CompletionEvent::SuspendDone.code()), &TABLE)
        .expect("suspend-done decodes");
    assert_eq!(
        suspend_done,
        SmcFunctionId::new(CallType::Fast, CallWidth::Smc64, SecureEntity::Tsp, 3)
    );

    let optee_done = smccc::decode(u64::from(CompletionEvent::OpTeeEntryDone.code()), &TABLE)
        .expect("op-tee entry-done decodes");
    assert_eq!(optee_done.call_type, CallType::Fast);
    assert_eq!(optee_done.width, CallWidth::Smc32);
    assert_eq!(optee_done.owning_entity, SecureEntity::OpTee);
    assert_eq!(optee_done.function_number, 0);
}
