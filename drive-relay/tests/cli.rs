use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_relay() {
    let mut cmd = Command::cargo_bin("drive-relay").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Relay user-submitted links"));
}

#[test]
fn serve_fails_clearly_on_a_missing_config_file() {
    let mut cmd = Command::cargo_bin("drive-relay").expect("Binary exists");
    cmd.arg("serve")
        .arg("--config")
        .arg("definitely-missing.yaml")
        .env("MEGA_EMAIL", "relay@example.com")
        .env("MEGA_PASSWORD", "hunter2");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn serve_requires_the_config_argument() {
    let mut cmd = Command::cargo_bin("drive-relay").expect("Binary exists");
    cmd.arg("serve");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}
