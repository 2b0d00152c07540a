use std::fs;
use std::path::Path;

use elfsim::{parse_address, resolve_toolchain, sha256_file, DEFAULT_OBJDUMP_FLAGS};
use tempfile::tempdir;

#[test]
fn parse_address_accepts_hex_and_decimal() {
    assert_eq!(parse_address("0x1000").expect("hex"), 0x1000);
    assert_eq!(parse_address("0X1a").expect("hex upper"), 0x1a);
    assert_eq!(parse_address("4096").expect("decimal"), 4096);
    assert_eq!(parse_address(" 0x10 ").expect("trimmed"), 0x10);
}

#[test]
fn parse_address_rejects_garbage() {
    assert!(parse_address("banana").is_err());
    assert!(parse_address("0xzz").is_err());
    assert!(parse_address("").is_err());
}

#[test]
fn resolve_toolchain_defaults_when_nothing_is_given() {
    let config = resolve_toolchain(None, None, None, None).expect("resolve");
    assert_eq!(config.prefix, "");
    assert_eq!(config.objdump_flags, DEFAULT_OBJDUMP_FLAGS);
    assert_eq!(config.objdump_path(), Path::new("objdump"));
}

#[test]
fn resolve_toolchain_layers_file_then_cli_flags() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("tools.yaml");
    fs::write(
        &file,
        "toolchain_dir: /opt/xpack/bin\nprefix: riscv-none-elf-\nobjdump_flags: \"-d\"\n",
    )
    .expect("write yaml");

    let from_file =
        resolve_toolchain(Some(file.to_str().expect("utf8 path")), None, None, None)
            .expect("resolve");
    assert_eq!(from_file.prefix, "riscv-none-elf-");
    assert_eq!(from_file.objdump_path(), Path::new("/opt/xpack/bin/riscv-none-elf-objdump"));

    let overridden = resolve_toolchain(
        Some(file.to_str().expect("utf8 path")),
        None,
        Some("arm-none-eabi-"),
        Some("-d -S"),
    )
    .expect("resolve");
    assert_eq!(overridden.prefix, "arm-none-eabi-");
    assert_eq!(overridden.objdump_flags, "-d -S");
    // File value survives where no flag overrides it.
    assert_eq!(overridden.toolchain_dir, Path::new("/opt/xpack/bin"));
}

#[test]
fn resolve_toolchain_fails_on_missing_config_file() {
    assert!(resolve_toolchain(Some("/nonexistent/tools.yaml"), None, None, None).is_err());
}

#[test]
fn sha256_file_hashes_known_content() {
    let dir = tempdir().expect("tempdir");
    let file = dir.path().join("blob.bin");
    fs::write(&file, b"abc").expect("write");

    let hash = sha256_file(&file).expect("hash");
    assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
}
