//! CLI smoke tests for the repokit binary
//!
//! These tests drive the real binary: help output, configuration validation
//! and end-to-end dynamic queries over a JSON file.

use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Helper to run the repokit binary with given arguments
fn run_repokit(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_repokit"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute repokit")
}

/// Minimal config that keeps everything inside the temp dir.
fn write_config(dir: &Path, extra: &str) -> String {
    let path = dir.join("repokit.yaml");
    let home = dir.join("home").to_string_lossy().replace('\\', "/");
    std::fs::write(&path, format!("home_dir: \"{home}\"\n{extra}")).expect("write config");
    path.to_string_lossy().to_string()
}

const PEOPLE: &str = r#"[
  {"id": 1, "firstName": "Ann", "lastName": "Smith", "age": 34},
  {"id": 2, "firstName": "Bob", "lastName": "Jones", "age": 17},
  {"id": 3, "firstName": "Cid", "lastName": "Smith", "age": 65},
  {"id": 4, "firstName": "Dee", "lastName": "Adams", "age": 18},
  {"id": 5, "firstName": "Eve", "lastName": "Jones", "age": 64,
   "deletedAt": "2024-01-01T00:00:00Z"}
]"#;

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write file");
    path.to_string_lossy().to_string()
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = run_repokit(args);
    assert!(
        output.status.success(),
        "repokit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_cli_help_command() {
    let output = run_repokit(&["--help"]);

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("repokit"), "Should contain binary name");
    assert!(stdout.contains("Usage:"), "Should contain usage information");
    assert!(stdout.contains("query"), "Should contain 'query' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(stdout.contains("--config"), "Should mention config option");
}

#[test]
fn test_cli_invalid_command() {
    let output = run_repokit(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "Should report an error: {stderr}");
}

#[test]
fn test_cli_config_validation_invalid_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_file(temp_dir.path(), "invalid.yaml", "invalid: yaml: content: [unclosed");

    let output = run_repokit(&["--config", &config_path, "check"]);

    assert!(!output.status.success(), "Should fail with invalid YAML");
}

#[test]
fn test_cli_config_validation_valid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(
        temp_dir.path(),
        r#"
repository:
  default_page_size: 20
  max_page_size: 100
logging:
  default:
    console_level: info
    file: "logs/repokit.log"
    file_level: info
"#,
    );

    let output = run_repokit(&["--config", &config_path, "check"]);

    assert!(
        output.status.success(),
        "Should succeed with valid config: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration check passed"));
    assert!(stdout.contains("max_page_size: 100"));
}

#[test]
fn test_cli_print_config_applies_overrides() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "");

    let output = run_repokit(&["--config", &config_path, "--max-page-size", "7", "--print-config"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("max_page_size: 7"), "{stdout}");
}

#[test]
fn test_cli_query_filters_sorts_and_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "");
    let data = write_file(temp_dir.path(), "people.json", PEOPLE);
    let query = write_file(
        temp_dir.path(),
        "query.json",
        r#"{
            "filter": {"field": "age", "operator": "gte", "value": "18", "logic": "and",
                       "filters": [{"field": "age", "operator": "lt", "value": "65"}]},
            "sort": [{"field": "lastName", "dir": "asc"}]
        }"#,
    );

    let page = run_json(&[
        "--config", &config_path, "query", "--data", &data, "--query", &query, "--size", "1",
    ]);

    assert_eq!(page["totalCount"], 2);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["hasNextPage"], true);
    assert_eq!(page["items"][0]["firstName"], "Dee");
}

#[test]
fn test_cli_query_hides_deleted_rows_by_default() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "");
    let data = write_file(temp_dir.path(), "people.json", PEOPLE);

    let page = run_json(&["--config", &config_path, "query", "--data", &data]);
    assert_eq!(page["totalCount"], 4);

    let page = run_json(&["--config", &config_path, "query", "--data", &data, "--with-deleted"]);
    assert_eq!(page["totalCount"], 5);
}

#[test]
fn test_cli_query_predicate_and_explain() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "");
    let data = write_file(temp_dir.path(), "people.json", PEOPLE);
    let query = write_file(
        temp_dir.path(),
        "query.json",
        r#"{"filter": {"field": "age", "operator": "gt", "value": "30"}}"#,
    );
    let predicate = r#"{"field": "lastName", "operator": "eq", "value": "Smith"}"#;

    let output = run_repokit(&[
        "--config", &config_path, "query", "--data", &data, "--query", &query, "--predicate",
        predicate, "--explain",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("filter: lastName == @0 and age > @1"), "{stdout}");
    assert!(stdout.contains(r#"params: ["Smith","30"]"#), "{stdout}");

    let page = run_json(&[
        "--config", &config_path, "query", "--data", &data, "--query", &query, "--predicate",
        predicate,
    ]);
    assert_eq!(page["totalCount"], 2);
}

#[test]
fn test_cli_query_rejects_unknown_field() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = write_config(temp_dir.path(), "");
    let data = write_file(temp_dir.path(), "people.json", PEOPLE);
    let query = write_file(
        temp_dir.path(),
        "query.json",
        r#"{"filter": {"field": "password", "operator": "eq", "value": "x"}}"#,
    );

    let output = run_repokit(&["--config", &config_path, "query", "--data", &data, "--query", &query]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("password"), "{stderr}");
}
