//! CLI end-to-end tests for the non-interactive commands.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempdir().unwrap() }
    }

    fn config(&self) -> std::path::PathBuf {
        self.dir.path().join("config").join("settings.json")
    }

    fn log_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("logs")
    }

    fn log_file(&self) -> std::path::PathBuf {
        self.log_dir().join("musichandler.log")
    }

    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("musichandler_rs").unwrap();
        cmd.env("MUSICHANDLER_CONFIG", self.config())
            .env("MUSICHANDLER_LOG_DIR", self.log_dir())
            .env_remove("RUST_LOG");
        cmd
    }

    fn settings_json(&self) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(self.config()).unwrap()).unwrap()
    }
}

#[test]
fn no_command_prints_help() {
    let env = Env::new();
    env.cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("uploads"));
}

#[test]
fn subcommand_help_is_detailed() {
    let env = Env::new();
    env.cmd()
        .args(["help", "id3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_invalid"));
}

#[test]
fn first_run_creates_settings() {
    let env = Env::new();
    env.cmd()
        .arg("settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default settings"))
        .stdout(predicate::str::contains("General information"))
        .stdout(predicate::str::contains("Log file information"))
        .stdout(predicate::str::contains("feature_tags"));

    let json = env.settings_json();
    assert_eq!(json["logging"], true);
    assert!(json["access_token"].is_null());
}

#[test]
fn set_source_stores_absolute_path() {
    let env = Env::new();
    let target = env.dir.path().join("downloads");

    env.cmd()
        .args(["set-source", target.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default source set to"));

    assert_eq!(env.settings_json()["source"], target.to_str().unwrap());
}

#[test]
fn set_dest_accepts_original_spelling() {
    let env = Env::new();
    let target = env.dir.path().join("library");

    env.cmd()
        .args(["set_dest", target.to_str().unwrap()])
        .assert()
        .success();

    assert_eq!(env.settings_json()["destination"], target.to_str().unwrap());
}

#[test]
fn set_source_without_path_prints_help() {
    let env = Env::new();
    env.cmd()
        .arg("set-source")
        .assert()
        .success()
        .stdout(predicate::str::contains("Set the default source directory"));
}

#[test]
fn log_off_and_on_persist() {
    let env = Env::new();

    env.cmd()
        .arg("log-off")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logger turned off."));
    assert_eq!(env.settings_json()["logging"], false);

    env.cmd()
        .arg("log-info")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"enabled\s+false").unwrap());

    env.cmd()
        .arg("log-on")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logger turned on."));
    assert_eq!(env.settings_json()["logging"], true);
}

#[test]
fn runs_are_logged_with_prefixes() {
    let env = Env::new();
    env.cmd().arg("log-info").assert().success();

    let log = fs::read_to_string(env.log_file()).unwrap();
    assert!(log.starts_with("----------\n"));
    assert!(log.contains("[+] ["));
    assert!(log.contains("log-info called."));
    assert!(log.contains("Exiting: 0"));
}

#[test]
fn disabled_logging_leaves_no_file() {
    let env = Env::new();
    env.cmd().arg("log-off").assert().success();
    env.cmd().arg("clear").assert().success();
    env.cmd().arg("settings").assert().success();

    assert!(!env.log_file().exists());
}

#[test]
fn clear_deletes_log_file() {
    let env = Env::new();
    env.cmd().arg("settings").assert().success();
    assert!(env.log_file().exists());

    env.cmd()
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Log file deleted"));
    assert!(!env.log_file().exists());
}

#[test]
fn broken_settings_file_fails() {
    let env = Env::new();
    let config = env.config();
    fs::create_dir_all(Path::new(&config).parent().unwrap()).unwrap();
    fs::write(&config, "{ not json").unwrap();

    env.cmd()
        .arg("settings")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));
}
