use std::env;
use std::path::PathBuf;

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let monitor_dir = PathBuf::from(&manifest_dir);

    println!("cargo:rerun-if-changed=src/arch_impl/aarch64/vectors.S");
    println!("cargo:rerun-if-changed=link.ld");

    // Only the bare-metal image needs the monitor memory layout
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "none" {
        println!(
            "cargo:rustc-link-arg-bins=-T{}",
            monitor_dir.join("link.ld").display()
        );
    }
}
