use std::fs::write;

use serial_test::serial;
use tempfile::NamedTempFile;

use drive_relay::load_config::load_config;

/// Creates a minimal config file for the relay to read (secrets stay in the
/// environment).
fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"relay:\n  download_dir: ./downloads\n  credentials_dir: ./credentials\n  drive_folder_name: DriveRelay\n  fallback_enabled: true\n",
    )
    .expect("Writing temp config failed");
    config
}

fn set_cloud_env() {
    std::env::set_var("MEGA_EMAIL", "relay@example.com");
    std::env::set_var("MEGA_PASSWORD", "hunter2");
}

#[test]
#[serial]
fn load_config_parses_yaml_and_injects_secrets() {
    set_cloud_env();
    let file = create_minimal_config();

    let config = load_config(file.path()).expect("config should load");

    assert_eq!(config.drive_folder_name, "DriveRelay");
    assert!(config.fallback_enabled);
    assert_eq!(config.download_dir, std::path::PathBuf::from("./downloads"));
    assert_eq!(config.cloud_source.email, "relay@example.com");
    assert_eq!(config.cloud_source.password, "hunter2");
}

#[test]
#[serial]
fn fallback_defaults_to_enabled_when_omitted() {
    set_cloud_env();
    let file = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        file.path(),
        b"relay:\n  download_dir: ./downloads\n  credentials_dir: ./credentials\n  drive_folder_name: DriveRelay\n",
    )
    .expect("Writing temp config failed");

    let config = load_config(file.path()).expect("config should load");
    assert!(config.fallback_enabled);
}

#[test]
#[serial]
fn load_config_fails_without_cloud_credentials_in_env() {
    std::env::remove_var("MEGA_EMAIL");
    std::env::remove_var("MEGA_PASSWORD");
    let file = create_minimal_config();

    let err = load_config(file.path()).expect_err("missing secrets must fail");
    assert!(err.to_string().contains("MEGA_EMAIL"));
}

#[test]
#[serial]
fn load_config_rejects_malformed_yaml() {
    set_cloud_env();
    let file = NamedTempFile::new().expect("Creating temp config file failed");
    write(file.path(), b"relay: [not, a, mapping\n").expect("Writing temp config failed");

    let err = load_config(file.path()).expect_err("malformed YAML must fail");
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn load_config_reports_a_missing_file() {
    set_cloud_env();
    let err = load_config("definitely-missing.yaml").expect_err("missing file must fail");
    assert!(err.to_string().contains("Failed to read config file"));
}
