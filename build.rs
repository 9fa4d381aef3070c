//! Puts `memory.x` on the linker search path for the firmware binary.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    fs::write(out.join("memory.x"), include_bytes!("memory.x")).unwrap();

    // Tell the linker where to find memory.x
    println!("cargo:rustc-link-search={}", out.display());

    // Only re-run the build script when memory.x is changed
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
