// Build script for linking the Embree library.
//
// Only does anything when the `embree` feature is enabled.
// Set EMBREE_DIR to the install prefix if embree4 is not on the default
// linker path (on Windows, VCPKG_ROOT is also honored).

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=EMBREE_DIR");

    if std::env::var_os("CARGO_FEATURE_EMBREE").is_none() {
        return;
    }

    println!("cargo:rustc-link-lib=embree4");

    if let Ok(embree_dir) = std::env::var("EMBREE_DIR") {
        println!("cargo:rustc-link-search=native={}/lib", embree_dir);
    } else if let Ok(vcpkg_root) = std::env::var("VCPKG_ROOT") {
        let lib_path = format!("{}\\installed\\x64-windows\\lib", vcpkg_root);
        println!("cargo:rustc-link-search=native={}", lib_path);
    }
}
