//! OP-TEE message interface, as far as the monitor answers it itself.

use super::{CompletionEvent, PayloadOutcome};
use crate::arch_impl::aarch64::ExceptionContext;
use crate::entity::SecureEntity;
use crate::error::{Malformation, SmcError};
use crate::smccc::{CallType, CallWidth, SmcFunctionId};

/// Fast, 32-bit, OEN 62, function 0.
pub const ENTRY_DONE: u32 =
    SmcFunctionId::new(CallType::Fast, CallWidth::Smc32, SecureEntity::OpTee, 0).encode() as u32;

/// Message protocol revision reported by `CallsRevision`.
pub const REVISION_MAJOR: u64 = 2;
pub const REVISION_MINOR: u64 = 0;

/// OPTEE_SMC_RETURN_OK
pub const RETURN_OK: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTeeFunction {
    /// Normal-world log message at the buffer in x1.
    Log,
    /// Process the message argument at physical address x1:x2.
    CallWithArg,
    CallsRevision,
}

impl OpTeeFunction {
    pub const fn from_number(number: u16) -> Option<Self> {
        match number {
            1 => Some(Self::Log),
            4 => Some(Self::CallWithArg),
            0xff03 => Some(Self::CallsRevision),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct OpTeePayload {
    messages: u64,
}

impl OpTeePayload {
    pub const fn new() -> Self {
        Self { messages: 0 }
    }

    /// Message arguments accepted so far.
    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn handle(
        &mut self,
        function: OpTeeFunction,
        id: &SmcFunctionId,
        ctx: &ExceptionContext,
    ) -> Result<PayloadOutcome, SmcError> {
        let results = match function {
            OpTeeFunction::Log => {
                log::info!(target: "optee", "log request, buffer {:#x}", ctx.arg(1));
                [RETURN_OK, 0, 0]
            }
            OpTeeFunction::CallWithArg => {
                if id.call_type != CallType::Yielding {
                    return Err(SmcError::MalformedCall(Malformation::CallTypeMismatch));
                }
                self.messages += 1;
                log::debug!(target: "optee", "message arg at {:#x}:{:#x}", ctx.arg(1), ctx.arg(2));
                [RETURN_OK, 0, 0]
            }
            OpTeeFunction::CallsRevision => [REVISION_MAJOR, REVISION_MINOR, 0],
        };
        Ok(PayloadOutcome::new(CompletionEvent::OpTeeEntryDone).with_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(call_type: CallType, number: u16) -> SmcFunctionId {
        SmcFunctionId::new(call_type, CallWidth::Smc32, SecureEntity::OpTee, number)
    }

    #[test]
    fn test_entry_done_code() {
        assert_eq!(ENTRY_DONE, 0xbe00_0000);
    }

    #[test]
    fn test_calls_revision() {
        let mut optee = OpTeePayload::new();
        let outcome = optee
            .handle(OpTeeFunction::CallsRevision, &id(CallType::Fast, 0xff03), &ExceptionContext::new())
            .unwrap();
        assert_eq!(outcome.event, CompletionEvent::OpTeeEntryDone);
        assert_eq!(outcome.results, [2, 0, 0]);
    }

    #[test]
    fn test_call_with_arg_is_yielding_only() {
        let mut optee = OpTeePayload::new();
        let ctx = ExceptionContext::new();
        assert_eq!(
            optee.handle(OpTeeFunction::CallWithArg, &id(CallType::Fast, 4), &ctx),
            Err(SmcError::MalformedCall(Malformation::CallTypeMismatch))
        );
        assert!(optee
            .handle(OpTeeFunction::CallWithArg, &id(CallType::Yielding, 4), &ctx)
            .is_ok());
        assert_eq!(optee.messages(), 1);
    }
}
