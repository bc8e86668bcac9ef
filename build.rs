//! Build script for proto compilation.
//!
//! Compiles `proto/provider.proto` into the gRPC types included by
//! `src/generated.rs`. A vendored `protoc` is used unless `PROTOC` is
//! already set in the environment.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/provider.proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    Ok(())
}
