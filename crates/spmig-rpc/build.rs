use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        // SAFETY: build scripts run single threaded.
        unsafe { std::env::set_var("PROTOC", protoc) };
    }

    // The descriptor set backs the server reflection service.
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("migrate_descriptor.bin"))
        .compile_protos(&["proto/migrate.proto"], &["proto"])?;
    Ok(())
}
