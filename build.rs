//! Build script for generating the control-channel gRPC code from
//! `proto/interceptor.proto`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/interceptor.proto");

    // Fall back to the bundled protoc when the environment does not provide one.
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_build::configure()
        // The operator CLI prints responses as JSON
        .type_attribute(".protos", "#[derive(serde::Serialize, serde::Deserialize)]")
        .compile_protos(&["proto/interceptor.proto"], &["proto"])?;

    Ok(())
}
