//! Test Secure Payload.
//!
//! Tracks a per-core CPU lifecycle and one preemptible call, and offers
//! four arithmetic services on x1/x2 used for smoke-testing the SMC path.

use super::{CompletionEvent, PayloadOutcome, Resume};
use crate::arch_impl::aarch64::ExceptionContext;
use crate::error::{DenyReason, Malformation, SmcError};
use crate::smccc::{CallWidth, SmcFunctionId};

pub const ENTRY_DONE: u32 = 0xf200_0000;
pub const ON_DONE: u32 = 0xf200_0001;
pub const OFF_DONE: u32 = 0xf200_0002;
pub const SUSPEND_DONE: u32 = 0xf200_0003;
pub const RESUME_DONE: u32 = 0xf200_0004;
pub const PREEMPTED: u32 = 0xf200_0005;
pub const ABORT_DONE: u32 = 0xf200_0007;
pub const SYSTEM_OFF_DONE: u32 = 0xf200_0008;
pub const SYSTEM_RESET_DONE: u32 = 0xf200_0009;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TspFunction {
    Entry,
    CpuOn,
    CpuOff,
    CpuResume,
    Abort,
    CpuSuspend,
    Preempt,
    SystemOff,
    SystemReset,
    Arithmetic(ArithmeticOp),
}

impl TspFunction {
    pub const fn from_number(number: u16) -> Option<Self> {
        let function = match number {
            0 => Self::Entry,
            1 => Self::CpuOn,
            2 => Self::CpuOff,
            3 => Self::CpuResume,
            4 => Self::Abort,
            5 => Self::CpuSuspend,
            6 => Self::Preempt,
            7 => Self::SystemOff,
            8 => Self::SystemReset,
            0x2000 => Self::Arithmetic(ArithmeticOp::Add),
            0x2001 => Self::Arithmetic(ArithmeticOp::Sub),
            0x2002 => Self::Arithmetic(ArithmeticOp::Mul),
            0x2003 => Self::Arithmetic(ArithmeticOp::Div),
            _ => return None,
        };
        Some(function)
    }
}

/// Power state of the payload on this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuLifecycle {
    On,
    Off,
    Suspended,
}

#[derive(Debug)]
pub struct TspPayload {
    lifecycle: CpuLifecycle,
    preempted: bool,
}

impl TspPayload {
    pub const fn new() -> Self {
        Self {
            lifecycle: CpuLifecycle::On,
            preempted: false,
        }
    }

    pub fn lifecycle(&self) -> CpuLifecycle {
        self.lifecycle
    }

    pub fn has_preempted_call(&self) -> bool {
        self.preempted
    }

    pub fn handle(
        &mut self,
        function: TspFunction,
        id: &SmcFunctionId,
        ctx: &ExceptionContext,
    ) -> Result<PayloadOutcome, SmcError> {
        let outcome = match function {
            TspFunction::Entry => PayloadOutcome::new(CompletionEvent::EntryDone),
            TspFunction::CpuOn => {
                self.transition(CpuLifecycle::Off, CpuLifecycle::On)?;
                PayloadOutcome::new(CompletionEvent::OnDone).resume(resume_at(ctx.arg(1)))
            }
            TspFunction::CpuOff => {
                self.transition(CpuLifecycle::On, CpuLifecycle::Off)?;
                self.preempted = false;
                PayloadOutcome::new(CompletionEvent::OffDone)
            }
            TspFunction::CpuResume => {
                self.transition(CpuLifecycle::Suspended, CpuLifecycle::On)?;
                PayloadOutcome::new(CompletionEvent::ResumeDone)
            }
            TspFunction::Abort => {
                if !self.preempted {
                    return Err(SmcError::Denied(DenyReason::NoPreemptedCall));
                }
                self.preempted = false;
                PayloadOutcome::new(CompletionEvent::AbortDone)
            }
            TspFunction::CpuSuspend => {
                self.transition(CpuLifecycle::On, CpuLifecycle::Suspended)?;
                PayloadOutcome::new(CompletionEvent::SuspendDone).resume(resume_at(ctx.arg(1)))
            }
            TspFunction::Preempt => {
                self.require(CpuLifecycle::On)?;
                self.preempted = true;
                PayloadOutcome::new(CompletionEvent::Preempted)
            }
            TspFunction::SystemOff => {
                self.lifecycle = CpuLifecycle::Off;
                self.preempted = false;
                PayloadOutcome::new(CompletionEvent::SystemOffDone)
            }
            TspFunction::SystemReset => {
                self.lifecycle = CpuLifecycle::On;
                self.preempted = false;
                PayloadOutcome::new(CompletionEvent::SystemResetDone)
            }
            TspFunction::Arithmetic(op) => {
                let result = arithmetic(op, id.width, ctx.arg(1), ctx.arg(2))?;
                PayloadOutcome::new(CompletionEvent::EntryDone).with_results([result, 0, 0])
            }
        };
        Ok(outcome)
    }

    fn require(&self, state: CpuLifecycle) -> Result<(), SmcError> {
        if self.lifecycle == state {
            Ok(())
        } else {
            log::debug!("tsp: lifecycle {:?}, expected {:?}", self.lifecycle, state);
            Err(SmcError::Denied(DenyReason::LifecycleState))
        }
    }

    fn transition(&mut self, from: CpuLifecycle, to: CpuLifecycle) -> Result<(), SmcError> {
        self.require(from)?;
        self.lifecycle = to;
        Ok(())
    }
}

impl Default for TspPayload {
    fn default() -> Self {
        Self::new()
    }
}

// Zero means "return to the caller".
fn resume_at(entry: u64) -> Resume {
    if entry == 0 {
        Resume::Caller
    } else {
        Resume::At(entry)
    }
}

fn arithmetic(op: ArithmeticOp, width: CallWidth, a: u64, b: u64) -> Result<u64, SmcError> {
    let invalid = SmcError::MalformedCall(Malformation::InvalidArgument);
    match width {
        CallWidth::Smc32 => {
            let (a, b) = (a as u32, b as u32);
            let result = match op {
                ArithmeticOp::Add => a.wrapping_add(b),
                ArithmeticOp::Sub => a.wrapping_sub(b),
                ArithmeticOp::Mul => a.wrapping_mul(b),
                ArithmeticOp::Div => a.checked_div(b).ok_or(invalid)?,
            };
            Ok(u64::from(result))
        }
        CallWidth::Smc64 => match op {
            ArithmeticOp::Add => Ok(a.wrapping_add(b)),
            ArithmeticOp::Sub => Ok(a.wrapping_sub(b)),
            ArithmeticOp::Mul => Ok(a.wrapping_mul(b)),
            ArithmeticOp::Div => a.checked_div(b).ok_or(invalid),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SecureEntity;
    use crate::smccc::CallType;

    fn id(width: CallWidth, number: u16) -> SmcFunctionId {
        SmcFunctionId::new(CallType::Fast, width, SecureEntity::Tsp, number)
    }

    fn call(tsp: &mut TspPayload, number: u16, args: [u64; 2]) -> Result<PayloadOutcome, SmcError> {
        let mut ctx = ExceptionContext::new();
        ctx.regs[1] = args[0];
        ctx.regs[2] = args[1];
        let function = TspFunction::from_number(number).unwrap();
        tsp.handle(function, &id(CallWidth::Smc64, number), &ctx)
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let mut tsp = TspPayload::new();
        let suspended = call(&mut tsp, 5, [0x8000_2000, 0]).unwrap();
        assert_eq!(suspended.event, CompletionEvent::SuspendDone);
        assert_eq!(suspended.resume, Resume::At(0x8000_2000));
        assert_eq!(tsp.lifecycle(), CpuLifecycle::Suspended);

        // Suspending twice is a lifecycle violation
        assert_eq!(
            call(&mut tsp, 5, [0, 0]),
            Err(SmcError::Denied(DenyReason::LifecycleState))
        );

        let resumed = call(&mut tsp, 3, [0, 0]).unwrap();
        assert_eq!(resumed.event, CompletionEvent::ResumeDone);
        assert_eq!(tsp.lifecycle(), CpuLifecycle::On);
    }

    #[test]
    fn test_cpu_on_requires_off() {
        let mut tsp = TspPayload::new();
        assert_eq!(
            call(&mut tsp, 1, [0x8000_0000, 0]),
            Err(SmcError::Denied(DenyReason::LifecycleState))
        );
        assert_eq!(call(&mut tsp, 2, [0, 0]).unwrap().event, CompletionEvent::OffDone);
        let on = call(&mut tsp, 1, [0, 0]).unwrap();
        assert_eq!(on.event, CompletionEvent::OnDone);
        assert_eq!(on.resume, Resume::Caller);
    }

    #[test]
    fn test_abort_needs_preempted_call() {
        let mut tsp = TspPayload::new();
        assert_eq!(
            call(&mut tsp, 4, [0, 0]),
            Err(SmcError::Denied(DenyReason::NoPreemptedCall))
        );
        assert_eq!(call(&mut tsp, 6, [0, 0]).unwrap().event, CompletionEvent::Preempted);
        assert!(tsp.has_preempted_call());
        assert_eq!(call(&mut tsp, 4, [0, 0]).unwrap().event, CompletionEvent::AbortDone);
        assert!(!tsp.has_preempted_call());
    }

    #[test]
    fn test_system_reset_restores_on() {
        let mut tsp = TspPayload::new();
        call(&mut tsp, 6, [0, 0]).unwrap();
        assert_eq!(call(&mut tsp, 7, [0, 0]).unwrap().event, CompletionEvent::SystemOffDone);
        assert_eq!(tsp.lifecycle(), CpuLifecycle::Off);
        assert_eq!(
            call(&mut tsp, 8, [0, 0]).unwrap().event,
            CompletionEvent::SystemResetDone
        );
        assert_eq!(tsp.lifecycle(), CpuLifecycle::On);
        assert!(!tsp.has_preempted_call());
    }

    #[test]
    fn test_arithmetic_widths() {
        assert_eq!(arithmetic(ArithmeticOp::Add, CallWidth::Smc64, 40, 2), Ok(42));
        assert_eq!(arithmetic(ArithmeticOp::Add, CallWidth::Smc32, 0xffff_ffff, 1), Ok(0));
        assert_eq!(
            arithmetic(ArithmeticOp::Sub, CallWidth::Smc64, 0, 1),
            Ok(u64::MAX)
        );
        assert_eq!(
            arithmetic(ArithmeticOp::Mul, CallWidth::Smc32, 0x1_0000_0003, 2),
            Ok(6)
        );
        assert_eq!(arithmetic(ArithmeticOp::Div, CallWidth::Smc64, 84, 2), Ok(42));
        assert_eq!(
            arithmetic(ArithmeticOp::Div, CallWidth::Smc32, 1, 0x1_0000_0000),
            Err(SmcError::MalformedCall(Malformation::InvalidArgument))
        );
    }

    #[test]
    fn test_unknown_numbers() {
        for number in [9u16, 0x1fff, 0x2004, 0xffff] {
            assert_eq!(TspFunction::from_number(number), None);
        }
    }
}
