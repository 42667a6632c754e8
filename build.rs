//! Build script for the radio parrot firmware
//!
//! Adds the linker search path for `memory.x` when building the
//! embedded target. Host builds need nothing.

fn main() {
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_some() {
        if let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") {
            println!("cargo:rustc-link-search={dir}");
        }
    }
}
