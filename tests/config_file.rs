// CLASSIFICATION: COMMUNITY
// Filename: config_file.rs v0.2
// Author: Lukas Bower
// Date Modified: 2027-08-18

use std::fs;

use tempfile::tempdir;

use wprboot::config::{self, BootConfig, CONF_PATH_ENV};
use wprboot::hal::HwFamily;
use wprboot::verify::Ed25519Validator;

#[test]
fn env_override_and_trust_anchor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("boot.toml");
    let key = ed25519_dalek::SigningKey::from_bytes(&[3u8; 32]).verifying_key();
    fs::write(
        &path,
        format!(
            "family = \"Ga10x\"\nfb_size = 1048576\nverifying_key = \"{}\"\n",
            hex::encode(key.to_bytes())
        ),
    )
    .unwrap();

    std::env::set_var(CONF_PATH_ENV, &path);
    let cfg = BootConfig::load().unwrap();
    std::env::remove_var(CONF_PATH_ENV);

    assert_eq!(cfg.family, HwFamily::Ga10x);
    assert_eq!(cfg.fb_size, 0x10_0000);
    assert_eq!(cfg.reserved_top, 0);
    let anchor = cfg.verifying_key_bytes().unwrap();
    assert!(Ed25519Validator::new(&anchor).is_ok());

    config::set_config(cfg.clone()).unwrap();
    assert_eq!(config::get_config().unwrap(), cfg);
}

#[test]
fn missing_file_reports_read_error() {
    let cfg = BootConfig::from_path(std::path::Path::new("/nonexistent/boot.toml"));
    assert!(matches!(cfg, Err(config::ConfigError::Read(_))));
}
