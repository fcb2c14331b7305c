fn main() {
    // Version information is injected by CI; local builds get empty values.
    let commit_hash = std::env::var("COMMIT_HASH").unwrap_or_default();
    let build_date = std::env::var("BUILD_DATE").unwrap_or_default();
    println!("cargo:rustc-env=S3RELAY_COMMIT_HASH={commit_hash}");
    println!("cargo:rustc-env=S3RELAY_BUILD_DATE={build_date}");
    println!("cargo:rerun-if-env-changed=COMMIT_HASH");
    println!("cargo:rerun-if-env-changed=BUILD_DATE");
}
