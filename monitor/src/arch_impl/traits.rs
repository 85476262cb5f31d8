//! Architecture-agnostic traits at the monitor's hardware seam.

/// Exception level of an interrupted context.
pub trait PrivilegeLevel: Copy + Eq {
    /// Returns the unprivileged level (EL0).
    fn user() -> Self;

    /// Returns true for the unprivileged level.
    fn is_user(&self) -> bool;

    /// Numeric exception level, 0 through 3.
    fn number(&self) -> u8;
}

/// Saved state of a trapped context.
///
/// The monitor rewrites these fields to choose where the trapped core
/// resumes.
pub trait InterruptFrame {
    /// The architecture's privilege level type.
    type Privilege: PrivilegeLevel;

    /// Address the core resumes at on exception return.
    fn instruction_pointer(&self) -> u64;

    /// Stack pointer of the interrupted context.
    fn stack_pointer(&self) -> u64;

    fn set_instruction_pointer(&mut self, addr: u64);

    fn set_stack_pointer(&mut self, addr: u64);

    /// Returns the privilege level at the time of the trap.
    fn privilege_level(&self) -> Self::Privilege;

    /// Returns true if the trap came from EL0.
    #[inline]
    fn is_from_userspace(&self) -> bool {
        self.privilege_level().is_user()
    }
}

/// Core-local CPU operations.
pub trait CpuOps {
    /// Mask every asynchronous exception on this core.
    ///
    /// # Safety
    ///
    /// The caller must not rely on interrupts being delivered afterwards.
    unsafe fn mask_all();

    /// Park the core until the next event.
    fn halt();

    /// Index of the executing core, as used for per-core state.
    fn current_core() -> usize;
}

/// CPU interface of the interrupt controller.
///
/// The monitor owns no interrupt sources itself: an interrupt routed to it
/// is acknowledged and completed so the line is not taken again on return.
pub trait InterruptController: Sync {
    /// Acknowledge the highest priority pending interrupt. `None` when the
    /// read is spurious.
    fn acknowledge(&self) -> Option<u32>;

    /// Signal end of interrupt for an ID returned by [`acknowledge`].
    ///
    /// [`acknowledge`]: InterruptController::acknowledge
    fn end_of_interrupt(&self, id: u32);
}
