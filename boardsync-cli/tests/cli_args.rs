use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn boardsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("boardsync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn reboot_without_port_is_rejected_before_watching() {
    let home = TempDir::new().expect("home");
    let src = TempDir::new().expect("src");

    boardsync_cmd(home.path())
        .arg("watch")
        .arg(src.path())
        .args(["E", "--reboot"])
        .assert()
        .failure()
        .stderr(contains("a serial port must be set when reboot is enabled"));
}

#[test]
fn watch_without_root_names_the_missing_setting() {
    let home = TempDir::new().expect("home");

    boardsync_cmd(home.path())
        .arg("watch")
        .assert()
        .failure()
        .stderr(contains("missing required setting 'root'"));
}

#[test]
fn missing_watch_directory_fails_instead_of_waiting() {
    let home = TempDir::new().expect("home");

    boardsync_cmd(home.path())
        .arg("watch")
        .arg(home.path().join("no-such-src"))
        .arg("E")
        .assert()
        .failure()
        .stderr(contains("is not a directory"));
}

#[test]
fn settings_file_supplies_reboot_without_port() {
    let home = TempDir::new().expect("home");
    let src = TempDir::new().expect("src");
    let config_dir = home.path().join(".boardsync");
    fs::create_dir_all(&config_dir).expect("config dir");
    fs::write(config_dir.join("config.yaml"), "volume: E\nreboot: true\n").expect("config");

    boardsync_cmd(home.path())
        .arg("watch")
        .arg(src.path())
        .assert()
        .failure()
        .stderr(contains("a serial port must be set"));
}

#[test]
fn explicit_missing_config_file_fails() {
    let home = TempDir::new().expect("home");

    boardsync_cmd(home.path())
        .args(["watch", "--config"])
        .arg(home.path().join("nope.yaml"))
        .assert()
        .failure()
        .stderr(contains("settings file not found"));
}

#[test]
fn reboot_on_missing_port_reports_serial_error() {
    let home = TempDir::new().expect("home");

    boardsync_cmd(home.path())
        .args(["reboot", "--port"])
        .arg(home.path().join("no-such-tty"))
        .assert()
        .failure()
        .stderr(contains("failed to soft-reboot board"));
}
