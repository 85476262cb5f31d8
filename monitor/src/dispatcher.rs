//! SMC dispatcher and world-switch state machine.
//!
//! One dispatcher per core. A trap is processed in bounded steps:
//!
//! ```text
//! Idle -> Pending -> Routing -> Executing -> Returning -> Idle
//!            |          `------------------> Returning      (rejected call)
//!            |-> Idle                                        (IRQ/FIQ/SError)
//!            `-> Halted                                      (fatal)
//! ```
//!
//! A trap that arrives while the dispatcher is anywhere but Idle is never
//! nested: see [`reject_nested`].

use log::{debug, error, trace, warn};

use crate::arch_impl::aarch64::constants::exception_class;
use crate::arch_impl::aarch64::{ExceptionContext, VectorClass, VectorSource, VectorTag};
use crate::arch_impl::{InterruptController, InterruptFrame};
use crate::config::ExceptionLevel;
use crate::entity::SecureEntityTable;
use crate::error::{DenyReason, FatalTrapError, Malformation, SmcError};
use crate::payload::{CompletionEvent, PayloadCall, PayloadOutcome, Payloads, Resume};
use crate::smccc::{self, CallWidth, SmcFunctionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Pending,
    Routing,
    Executing,
    Returning,
    Halted,
}

/// How a recoverable trap was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// SMC handled; x0 holds the event code.
    Completed(CompletionEvent),
    /// SMC refused; x0 holds the error code.
    Rejected(SmcError),
    /// Asynchronous exception acknowledged without touching the frame.
    Forwarded(VectorClass),
}

enum Classification {
    Smc,
    Forward(VectorClass),
}

struct Routed {
    id: SmcFunctionId,
    call: PayloadCall,
}

pub struct Dispatcher<'t> {
    level: ExceptionLevel,
    table: &'t SecureEntityTable,
    gic: &'t dyn InterruptController,
    state: DispatchState,
    payloads: Payloads,
    /// Normal-world frame saved while a secure applet runs.
    parked: Option<ExceptionContext>,
}

impl<'t> Dispatcher<'t> {
    pub const fn new(
        level: ExceptionLevel,
        table: &'t SecureEntityTable,
        gic: &'t dyn InterruptController,
    ) -> Self {
        Self {
            level,
            table,
            gic,
            state: DispatchState::Idle,
            payloads: Payloads::new(),
            parked: None,
        }
    }

    pub fn level(&self) -> ExceptionLevel {
        self.level
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn payloads(&self) -> &Payloads {
        &self.payloads
    }

    pub fn payloads_mut(&mut self) -> &mut Payloads {
        &mut self.payloads
    }

    pub fn parked(&self) -> Option<&ExceptionContext> {
        self.parked.as_ref()
    }

    /// Process one trap against the saved frame `ctx`.
    ///
    /// On return the frame describes where the core resumes. A fatal error
    /// leaves the frame as it was and the dispatcher Halted.
    pub fn handle_trap(
        &mut self,
        tag: VectorTag,
        ctx: &mut ExceptionContext,
    ) -> Result<TrapOutcome, FatalTrapError> {
        match self.state {
            DispatchState::Idle => {}
            DispatchState::Halted => return Err(FatalTrapError::Halted),
            _ => return reject_nested(tag, ctx, self.gic).map_err(|err| self.halt(err)),
        }

        if let Classification::Forward(class) = self.classify(tag, ctx)? {
            return Ok(TrapOutcome::Forwarded(class));
        }
        let result = self
            .route(tag.source, ctx)
            .and_then(|routed| self.execute(routed, ctx));
        Ok(self.complete(result, ctx))
    }

    fn classify(
        &mut self,
        tag: VectorTag,
        ctx: &ExceptionContext,
    ) -> Result<Classification, FatalTrapError> {
        self.state = DispatchState::Pending;
        trace!("{} elr={:#x}", tag, ctx.elr);

        if !tag.is_recoverable() {
            return Err(self.halt(FatalTrapError::UnrecoverableVector(tag)));
        }
        match tag.class {
            VectorClass::Synchronous => {
                let ec = ctx.exception_class();
                if tag.source.is_lower() && exception_class::is_smc(ec) {
                    self.state = DispatchState::Routing;
                    Ok(Classification::Smc)
                } else {
                    Err(self.halt(FatalTrapError::UnexpectedSync { tag, ec }))
                }
            }
            class => {
                acknowledge(self.gic, tag);
                self.state = DispatchState::Idle;
                Ok(Classification::Forward(class))
            }
        }
    }

    fn route(&mut self, source: VectorSource, ctx: &ExceptionContext) -> Result<Routed, SmcError> {
        let routed = smccc::decode(ctx.smc_function(), self.table).and_then(|id| {
            if source == VectorSource::LowerAarch32 && id.width == CallWidth::Smc64 {
                return Err(SmcError::MalformedCall(Malformation::WidthMismatch));
            }
            PayloadCall::resolve(&id).map(|call| Routed { id, call })
        });
        self.state = match routed {
            Ok(_) => DispatchState::Executing,
            Err(_) => DispatchState::Returning,
        };
        routed
    }

    fn execute(&mut self, routed: Routed, ctx: &ExceptionContext) -> Result<PayloadOutcome, SmcError> {
        debug!("smc {:?} -> {}", routed.id, routed.id.owning_entity);
        let caller = ctx.world(self.level);
        let outcome = self.payloads.invoke(routed.call, &routed.id, ctx, caller);
        self.state = DispatchState::Returning;
        outcome
    }

    fn complete(
        &mut self,
        result: Result<PayloadOutcome, SmcError>,
        ctx: &mut ExceptionContext,
    ) -> TrapOutcome {
        let outcome = match result.and_then(|outcome| self.resume(outcome, ctx)) {
            Ok(event) => TrapOutcome::Completed(event),
            Err(err) => {
                warn!("smc {:#x} rejected: {}", ctx.smc_function(), err);
                ctx.write_return(err.return_value(), [0; 3]);
                TrapOutcome::Rejected(err)
            }
        };
        self.state = DispatchState::Idle;
        outcome
    }

    /// Apply the payload's resume decision, then write the results. The
    /// frame is only modified once every check has passed.
    fn resume(
        &mut self,
        outcome: PayloadOutcome,
        ctx: &mut ExceptionContext,
    ) -> Result<CompletionEvent, SmcError> {
        match outcome.resume {
            Resume::Caller => {}
            Resume::At(entry) => ctx.set_instruction_pointer(entry),
            Resume::World { world, entry, stack } => {
                self.require_world_switch()?;
                if self.parked.is_some() {
                    return Err(SmcError::Busy);
                }
                self.parked = Some(*ctx);
                *ctx = ctx.entering(world, entry, stack);
                debug!("entering {:?} world at {:#x}", world, entry);
            }
            Resume::Restore => {
                self.require_world_switch()?;
                let parked = self
                    .parked
                    .take()
                    .ok_or(SmcError::Denied(DenyReason::NoParkedContext))?;
                *ctx = parked;
                debug!("restored parked context, elr={:#x}", ctx.elr);
            }
        }
        ctx.write_return(u64::from(outcome.event.code()), outcome.results);
        Ok(outcome.event)
    }

    fn require_world_switch(&self) -> Result<(), SmcError> {
        if self.level.can_switch_worlds() {
            Ok(())
        } else {
            error!("world switch requested but the monitor runs at {}", self.level);
            Err(SmcError::Denied(DenyReason::WorldSwitchUnavailable))
        }
    }

    fn halt(&mut self, err: FatalTrapError) -> FatalTrapError {
        self.state = DispatchState::Halted;
        error!("halting: {}", err);
        err
    }
}

/// Acknowledge and complete an interrupt routed to the monitor. SError has
/// nothing to acknowledge.
fn acknowledge(gic: &dyn InterruptController, tag: VectorTag) {
    match tag.class {
        VectorClass::Irq | VectorClass::Fiq => match gic.acknowledge() {
            Some(id) => {
                debug!("{}: interrupt {} acknowledged", tag, id);
                gic.end_of_interrupt(id);
            }
            None => trace!("{}: spurious", tag),
        },
        _ => debug!("forwarding {}", tag),
    }
}

/// Resolve a trap that arrived while its core's dispatcher was busy.
///
/// Nested SMCs get BUSY written to their own frame, asynchronous exceptions
/// are acknowledged and forwarded, and anything else is fatal. No dispatcher
/// state is read or written, so this also serves callers that could not take
/// the per-core lock.
pub fn reject_nested(
    tag: VectorTag,
    ctx: &mut ExceptionContext,
    gic: &dyn InterruptController,
) -> Result<TrapOutcome, FatalTrapError> {
    if !tag.is_recoverable() {
        return Err(FatalTrapError::UnrecoverableVector(tag));
    }
    match tag.class {
        VectorClass::Synchronous => {
            let ec = ctx.exception_class();
            if tag.source.is_lower() && exception_class::is_smc(ec) {
                warn!("nested smc {:#x} while busy", ctx.smc_function());
                ctx.write_return(SmcError::Busy.return_value(), [0; 3]);
                Ok(TrapOutcome::Rejected(SmcError::Busy))
            } else {
                Err(FatalTrapError::UnexpectedSync { tag, ec })
            }
        }
        class => {
            acknowledge(gic, tag);
            Ok(TrapOutcome::Forwarded(class))
        }
    }
}
