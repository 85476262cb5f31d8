//! Secure payload capabilities.
//!
//! The monitor hosts a closed set of payloads, one per [`SecureEntity`].
//! A payload receives a resolved call and the trapped frame and answers
//! with a [`PayloadOutcome`]: the completion event reported in x0, up to
//! three result registers, and where the core should resume.

pub mod custom;
pub mod optee;
pub mod tsp;

use crate::arch_impl::aarch64::{ExceptionContext, World};
use crate::entity::SecureEntity;
use crate::error::{Malformation, SmcError};
use crate::smccc::SmcFunctionId;

use custom::{CustomFunction, CustomPayload};
use optee::{OpTeeFunction, OpTeePayload};
use tsp::{TspFunction, TspPayload};

/// Completion codes written back to x0 on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEvent {
    EntryDone,
    OnDone,
    OffDone,
    SuspendDone,
    ResumeDone,
    Preempted,
    AbortDone,
    SystemOffDone,
    SystemResetDone,
    OpTeeEntryDone,
    CustomEntryDone,
}

impl CompletionEvent {
    pub const ALL: [Self; 11] = [
        Self::EntryDone,
        Self::OnDone,
        Self::OffDone,
        Self::SuspendDone,
        Self::ResumeDone,
        Self::Preempted,
        Self::AbortDone,
        Self::SystemOffDone,
        Self::SystemResetDone,
        Self::OpTeeEntryDone,
        Self::CustomEntryDone,
    ];

    pub const fn code(self) -> u32 {
        match self {
            Self::EntryDone => tsp::ENTRY_DONE,
            Self::OnDone => tsp::ON_DONE,
            Self::OffDone => tsp::OFF_DONE,
            Self::SuspendDone => tsp::SUSPEND_DONE,
            Self::ResumeDone => tsp::RESUME_DONE,
            Self::Preempted => tsp::PREEMPTED,
            Self::AbortDone => tsp::ABORT_DONE,
            Self::SystemOffDone => tsp::SYSTEM_OFF_DONE,
            Self::SystemResetDone => tsp::SYSTEM_RESET_DONE,
            Self::OpTeeEntryDone => optee::ENTRY_DONE,
            Self::CustomEntryDone => custom::ENTRY_DONE,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.code() == code)
    }

    pub const fn entity(self) -> SecureEntity {
        match self {
            Self::OpTeeEntryDone => SecureEntity::OpTee,
            Self::CustomEntryDone => SecureEntity::Custom,
            _ => SecureEntity::Tsp,
        }
    }
}

/// Where the trapped core continues after a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Return to the instruction after the SMC.
    Caller,
    /// Return to the caller's world at a new address.
    At(u64),
    /// Park the caller and enter `world` at EL1h.
    World { world: World, entry: u64, stack: u64 },
    /// Drop the current context and resume the parked one.
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadOutcome {
    pub event: CompletionEvent,
    pub results: [u64; 3],
    pub resume: Resume,
}

impl PayloadOutcome {
    pub const fn new(event: CompletionEvent) -> Self {
        Self {
            event,
            results: [0; 3],
            resume: Resume::Caller,
        }
    }

    pub const fn with_results(mut self, results: [u64; 3]) -> Self {
        self.results = results;
        self
    }

    pub const fn resume(mut self, resume: Resume) -> Self {
        self.resume = resume;
        self
    }
}

/// A function resolved within its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCall {
    Tsp(TspFunction),
    OpTee(OpTeeFunction),
    Custom(CustomFunction),
}

impl PayloadCall {
    pub fn resolve(id: &SmcFunctionId) -> Result<Self, SmcError> {
        let number = id.function_number;
        let call = match id.owning_entity {
            SecureEntity::Tsp => TspFunction::from_number(number).map(Self::Tsp),
            SecureEntity::OpTee => OpTeeFunction::from_number(number).map(Self::OpTee),
            SecureEntity::Custom => CustomFunction::from_number(number).map(Self::Custom),
        };
        call.ok_or(SmcError::MalformedCall(Malformation::UnknownFunction { number }))
    }
}

/// Per-core payload state.
#[derive(Debug)]
pub struct Payloads {
    pub tsp: TspPayload,
    pub optee: OpTeePayload,
    pub custom: CustomPayload,
}

impl Payloads {
    pub const fn new() -> Self {
        Self {
            tsp: TspPayload::new(),
            optee: OpTeePayload::new(),
            custom: CustomPayload::new(),
        }
    }

    /// Run `call`. `caller` is the trapped context's world, `None` when the
    /// monitor cannot tell (EL1).
    pub fn invoke(
        &mut self,
        call: PayloadCall,
        id: &SmcFunctionId,
        ctx: &ExceptionContext,
        caller: Option<World>,
    ) -> Result<PayloadOutcome, SmcError> {
        match call {
            PayloadCall::Tsp(function) => self.tsp.handle(function, id, ctx),
            PayloadCall::OpTee(function) => self.optee.handle(function, id, ctx),
            PayloadCall::Custom(function) => self.custom.handle(function, ctx, caller),
        }
    }
}

impl Default for Payloads {
    fn default() -> Self {
        Self::new()
    }
}
