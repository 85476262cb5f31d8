//! AArch64 implementation of the monitor's architecture layer.

pub mod constants;
pub mod exception_frame;
pub mod gic;
pub mod privilege;
pub mod vectors;

#[cfg(target_arch = "aarch64")]
pub mod cpu;
#[cfg(target_arch = "aarch64")]
pub mod sysreg;

pub use exception_frame::{ExceptionContext, World};
pub use gic::Gicv2CpuInterface;
pub use privilege::Aarch64PrivilegeLevel;
pub use vectors::{VectorClass, VectorSource, VectorTag};

#[cfg(target_arch = "aarch64")]
pub use cpu::Aarch64Cpu;
