//! Architecture layer for the monitor.
//!
//! The monitor only targets AArch64. Anything that touches live system
//! registers is gated on `target_arch = "aarch64"`; the frame layout, vector
//! taxonomy and register decoding build everywhere so the dispatcher can be
//! tested on the host.

pub mod aarch64;

pub mod traits;
pub use traits::*;
