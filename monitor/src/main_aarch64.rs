//! Monitor image entry point.
//!
//! The platform boot stub sets up a per-core stack and calls
//! `monitor_main(core)` on every core, primary (core 0) first. On hosted
//! targets this binary is an empty stub; the library carries everything
//! testable.

#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
extern crate rlibc; // Provides memcpy, memmove, memset, memcmp

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod image {
    use core::panic::PanicInfo;

    use log::{error, info, LevelFilter};
    use monitor::arch_impl::aarch64::sysreg::SystemRegisters;
    use monitor::arch_impl::aarch64::{vectors, Aarch64Cpu};
    use monitor::arch_impl::CpuOps;
    use monitor::config::BUILD_LEVEL;
    use monitor::{logger, per_cpu, serial};

    #[no_mangle]
    pub extern "C" fn monitor_main(core: u64) {
        if core == 0 {
            serial::init();
            if logger::init(LevelFilter::Debug).is_ok() {
                logger::serial_ready();
            }
            per_cpu::init(BUILD_LEVEL);
        }

        let registers = SystemRegisters::new(BUILD_LEVEL);
        registers.set_vector_base(vectors::table_base());
        match registers.secure_config() {
            Some(scr) => info!("core {}: vectors installed, SCR_EL3={:#x}", core, scr),
            None => info!("core {}: vectors installed", core),
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        // SAFETY: the core never resumes after a monitor panic.
        unsafe { Aarch64Cpu::mask_all() };
        error!("monitor panic: {}", info);
        loop {
            Aarch64Cpu::halt();
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
