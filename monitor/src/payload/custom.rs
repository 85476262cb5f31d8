//! Applet host behind the CUSTOM owning entity.
//!
//! Function n in 1..=MAX_APPLETS runs applet n-1 at S-EL1h; the applet
//! hands its result back with function 0 (exit), which restores the
//! normal-world frame the dispatcher parked on entry.

use super::{CompletionEvent, PayloadOutcome, Resume};
use crate::arch_impl::aarch64::{ExceptionContext, World};
use crate::config::MAX_APPLETS;
use crate::entity::SecureEntity;
use crate::error::{DenyReason, SmcError};
use crate::smccc::{CallType, CallWidth, SmcFunctionId};

/// Fast, 32-bit, OEN 61, function 0.
pub const ENTRY_DONE: u32 =
    SmcFunctionId::new(CallType::Fast, CallWidth::Smc32, SecureEntity::Custom, 0).encode() as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFunction {
    AppletExit,
    Invoke { slot: usize },
}

impl CustomFunction {
    pub const fn from_number(number: u16) -> Option<Self> {
        match number {
            0 => Some(Self::AppletExit),
            n if (n as usize) <= MAX_APPLETS => Some(Self::Invoke {
                slot: n as usize - 1,
            }),
            _ => None,
        }
    }
}

/// Secure EL1 routine and the SP_EL1 it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applet {
    pub entry: u64,
    pub stack: u64,
}

#[derive(Debug)]
pub struct CustomPayload {
    applets: [Option<Applet>; MAX_APPLETS],
}

impl CustomPayload {
    pub const fn new() -> Self {
        Self {
            applets: [None; MAX_APPLETS],
        }
    }

    /// Take the first free slot; returns the function number that invokes
    /// the applet.
    pub fn register(&mut self, applet: Applet) -> Option<u16> {
        let slot = self.applets.iter().position(Option::is_none)?;
        self.applets[slot] = Some(applet);
        Some(slot as u16 + 1)
    }

    pub fn applet(&self, slot: usize) -> Option<&Applet> {
        self.applets.get(slot).and_then(Option::as_ref)
    }

    pub fn handle(
        &self,
        function: CustomFunction,
        ctx: &ExceptionContext,
        caller: Option<World>,
    ) -> Result<PayloadOutcome, SmcError> {
        match function {
            CustomFunction::AppletExit => {
                match caller {
                    Some(World::Secure) => {}
                    Some(World::NonSecure) => return Err(SmcError::Denied(DenyReason::CallerWorld)),
                    None => return Err(SmcError::Denied(DenyReason::WorldSwitchUnavailable)),
                }
                Ok(PayloadOutcome::new(CompletionEvent::CustomEntryDone)
                    .with_results([ctx.arg(1), 0, 0])
                    .resume(Resume::Restore))
            }
            CustomFunction::Invoke { slot } => {
                if caller == Some(World::Secure) {
                    return Err(SmcError::Denied(DenyReason::CallerWorld));
                }
                let applet = self
                    .applet(slot)
                    .ok_or(SmcError::Denied(DenyReason::AppletNotRegistered))?;
                Ok(PayloadOutcome::new(CompletionEvent::CustomEntryDone)
                    .with_results([ctx.arg(1), ctx.arg(2), ctx.arg(3)])
                    .resume(Resume::World {
                        world: World::Secure,
                        entry: applet.entry,
                        stack: applet.stack,
                    }))
            }
        }
    }
}

impl Default for CustomPayload {
    fn default() -> Self {
        Self::new()
    }
}
