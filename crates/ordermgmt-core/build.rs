/// Builds the gRPC client and server code for `ordermgmt.proto` using
/// `tonic-prost-build`.
///
/// The generated module lives in `OUT_DIR` and is pulled in through
/// `tonic::include_proto!("ecommerce")`. A file descriptor set is written next
/// to it so the server can register gRPC reflection.
///
/// # Panics
///
/// Panics if code generation fails, which aborts the build with the protoc
/// diagnostics.
use std::env;
use std::path::PathBuf;
fn main() {
    println!("cargo:rerun-if-changed=proto/ordermgmt.proto");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("ordermgmt_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/ordermgmt.proto"], &["proto"])
        .unwrap();
}
