//! Build script for proto compilation.
//!
//! Compiles `proto/provider.proto` into the plugin protocol types and the
//! tonic server stub. The output lands in `OUT_DIR` and is pulled in by
//! `src/generated.rs`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
