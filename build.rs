//! Build script for the provider protocol.
//!
//! Compiles `proto/provider.proto` into `$OUT_DIR/provider.v1.rs`, which
//! `src/lib.rs` pulls in as the `generated` module. A vendored `protoc` is
//! used unless `PROTOC` is already set.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
