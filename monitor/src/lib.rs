//! Secure monitor for AArch64.
//!
//! Normal-world software enters the monitor with SMC. The vector stubs save
//! an [`ExceptionContext`](arch_impl::aarch64::ExceptionContext), the
//! per-core [`Dispatcher`](dispatcher::Dispatcher) decodes the SMCCC
//! function identifier, routes it to the owning secure payload and writes
//! the result back into the frame before `eret`.
//!
//! The library builds `no_std` for the monitor image and with `std` under
//! `cargo test`, where everything except live register access runs on the
//! host.

#![cfg_attr(not(test), no_std)]

pub mod arch_impl;
pub mod config;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod logger;
pub mod mem;
pub mod payload;
pub mod per_cpu;
pub mod smccc;
pub mod trap;

#[cfg(target_arch = "aarch64")]
pub mod serial;
