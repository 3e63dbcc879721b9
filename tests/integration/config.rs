//! Configuration files feeding a session

use std::io::Write;

use solo::core::HostConfig as CoreConfig;
use solo::prelude::*;
use tempfile::NamedTempFile;

#[test]
fn test_session_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
sample_rate = 48000
block_size = 512
vendor = "Integration"
"#
    )
    .unwrap();

    let config = HostConfig::from_toml_file(file.path()).unwrap();
    let session = Session::builder().config(config).build().unwrap();

    assert_eq!(session.config().sample_rate, 48000);
    assert_eq!(session.config().block_size, 512);
    assert_eq!(session.config().vendor, "Integration");
    assert_eq!(session.config().product, CoreConfig::default().product);
    assert_eq!(session.instance().block_size(), 512);
}

#[test]
fn test_builder_overrides_config() {
    let config = HostConfig::from_toml_str("block_size = 512").unwrap();
    let session = Session::builder()
        .config(config)
        .block_size(128)
        .build()
        .unwrap();
    assert_eq!(session.instance().block_size(), 128);
}

#[test]
fn test_invalid_file_is_reported() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "block_size = \"large\"").unwrap();
    assert!(HostConfig::from_toml_file(file.path()).is_err());
}

#[test]
fn test_oversized_identity_rejected() {
    let result = Session::builder()
        .config(HostConfig {
            vendor: "v".repeat(64),
            ..HostConfig::default()
        })
        .build();
    assert!(matches!(result, Err(Error::Core(_))));
}
