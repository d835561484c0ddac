//! CLI surface smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const SETTINGS_YAML: &str = r#"
credentials:
  valid: { username: admin, password: admin }
  invalid: { username: admin, password: wrongpassword }
  api: { username: jsmith, password: demo1234 }
transfer:
  from_account: 800000 Checking
  to_account: 800000 Corporate
  amount: "100000.00"
filters:
  date_range: { start: 01/03/2025, end: 08/03/2025 }
  api_dates: { start: 01/01/2025, end: 31/03/2025 }
  min_deposit: 100.0
headless: true
"#;

fn settings_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn info_prints_resolved_settings() {
    let file = settings_file(SETTINGS_YAML);
    Command::cargo_bin("altoro")
        .unwrap()
        .args(["-c", file.path().to_str().unwrap(), "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://demo.testfire.net"))
        .stdout(predicate::str::contains("800000 Checking -> 800000 Corporate"))
        .stdout(predicate::str::contains("tolerance:      0.01"));
}

#[test]
fn missing_settings_file_exits_with_config_code() {
    Command::cargo_bin("altoro")
        .unwrap()
        .args(["-c", "/nonexistent/settings.yaml", "info"])
        .assert()
        .code(2);
}

#[test]
fn invalid_settings_are_rejected_before_any_step() {
    let file = settings_file(&SETTINGS_YAML.replace("\"100000.00\"", "\"lots\""));
    Command::cargo_bin("altoro")
        .unwrap()
        .args(["-c", file.path().to_str().unwrap(), "info"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("transfer.amount"));
}

#[test]
fn help_lists_the_run_and_info_commands() {
    Command::cargo_bin("altoro")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("info"));
}
