// build.rs

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").unwrap_or_else(|_| "x86_64-unknown-linux-gnu".to_string());
    println!("cargo:rustc-env=KGEN_DEFAULT_TARGET={}", target);

    // SVE is not encoded in the triple, only in the enabled target features.
    let features = env::var("CARGO_CFG_TARGET_FEATURE").unwrap_or_default();
    let sve = features.split(',').any(|f| f == "sve");
    println!("cargo:rustc-env=KGEN_DEFAULT_SVE={}", if sve { "1" } else { "0" });
}
