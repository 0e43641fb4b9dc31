//! CLI integration tests for ormsync.
//!
//! These tests cover argument parsing, exit codes, script output and a
//! synchronize/validate cycle against a temporary SQLite database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Get a command for the ormsync binary.
fn cmd() -> Command {
    Command::cargo_bin("ormsync").unwrap()
}

const TABLES: &str = r#"
tables:
  - name: customer
    columns:
      - { name: id, kind: long, primary_key: true }
      - { name: name, kind: text, length: 64, mandatory: true }
  - name: ord_order
    columns:
      - { name: id, kind: long, primary_key: true }
      - { name: customer_id, kind: long, references: customer }
"#;

/// Write a config for `dialect` into `dir`, using a database file in `dir`.
fn write_config(dir: &Path, dialect: &str) -> String {
    let path = dir.join("config.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  dialect: {}", dialect).unwrap();
    writeln!(file, "  url: {}", dir.join("app.db").display()).unwrap();
    write!(file, "{}", TABLES).unwrap();
    path.to_str().unwrap().to_string()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ddl"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("dialects"));
}

#[test]
fn test_global_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_sync_subcommand_help() {
    cmd()
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ormsync"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_dialects_needs_no_config() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "dialects"])
        .assert()
        .success()
        .stdout(predicate::str::contains("postgresql"))
        .stdout(predicate::str::contains("sqlite"))
        .stdout(predicate::str::contains("firebird"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "ddl"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "ddl"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "ddl"])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_dialect_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "h2");
    cmd()
        .args(["--config", &config, "ddl", "--dialect", "informix"])
        .assert()
        .code(1);
}

// =============================================================================
// Script Output Tests
// =============================================================================

#[test]
fn test_ddl_prints_creation_script() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "h2");
    cmd()
        .args(["--config", &config, "ddl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE customer"))
        .stdout(predicate::str::contains("CREATE TABLE ord_order"))
        .stdout(predicate::str::contains("FOREIGN KEY"))
        .stdout(predicate::str::contains("ormsync_pk_support"));
}

#[test]
fn test_ddl_dialect_override_as_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "h2");
    cmd()
        .args(["--config", &config, "--output-json", "ddl", "--dialect", "postgres"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"step\": \"table\""))
        .stdout(predicate::str::contains("\"step\": \"sequence_table\""));
}

// =============================================================================
// Synchronization Tests
// =============================================================================

#[test]
fn test_validate_before_sync_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "sqlite");
    cmd().args(["--config", &config, "validate"]).assert().code(2);
}

#[test]
fn test_sync_then_validate() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "sqlite");

    cmd()
        .args(["--config", &config, "--output-json", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"first_run\": true"))
        .stdout(predicate::str::contains("\"new_tables\": 2"));

    cmd()
        .args(["--config", &config, "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("First run: false"));
}

#[test]
fn test_dry_run_leaves_database_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "sqlite");

    cmd()
        .args(["--config", &config, "sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run completed!"))
        .stdout(predicate::str::contains("CREATE TABLE customer"));

    cmd().args(["--config", &config, "validate"]).assert().code(2);
}

#[test]
fn test_sync_rejects_non_sqlite_dialect() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "postgresql");
    cmd()
        .args(["--config", &config, "sync"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sqlite"));
}
