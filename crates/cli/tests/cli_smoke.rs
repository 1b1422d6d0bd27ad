//! CLI smoke tests for cfgraph.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the cfgraph binary.
fn cfgraph_cmd() -> Command {
  cargo_bin_cmd!("cfgraph")
}

/// Create a temp directory with a model file.
fn temp_model(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("model.json"), content).unwrap();
  temp
}

const MODEL: &str = r#"
{
  "elements": [
    { "path": "project", "kind": "value", "value": "demo" },
    { "path": "flags", "kind": "list", "value": ["-g"] },
    { "path": "deps", "kind": "map" },
    { "path": "scratch", "kind": "value", "hidden": true }
  ],
  "rules": [
    { "role": "mutate", "subject": "flags", "op": "append", "value": "-O2" },
    { "role": "mutate", "subject": "deps", "op": "insert", "name": "serde", "value": "1.0" },
    { "role": "finalize", "subject": "project", "op": "copy", "input": "scratch" },
    { "role": "mutate", "subject": "scratch", "op": "set", "value": "copied" },
    { "role": "validate", "subject": "project", "op": "expect", "value": "copied" }
  ]
}
"#;

const UNBOUND_MODEL: &str = r#"
{
  "elements": [{ "path": "project", "kind": "value" }],
  "rules": [{ "role": "mutate", "subject": "missing", "op": "set", "value": 1 }]
}
"#;

const CYCLIC_MODEL: &str = r#"
{
  "elements": [
    { "path": "a", "kind": "value" },
    { "path": "b", "kind": "value" }
  ],
  "rules": [
    { "role": "mutate", "subject": "a", "op": "copy", "input": "b" },
    { "role": "mutate", "subject": "b", "op": "copy", "input": "a" }
  ]
}
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cfgraph_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cfgraph_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("cfgraph"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["report", "check"] {
    cfgraph_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// report
// =============================================================================

#[test]
fn report_prints_realized_elements() {
  let temp = temp_model(MODEL);

  cfgraph_cmd()
    .arg("report")
    .arg(temp.path().join("model.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("+ flags"))
    .stdout(predicate::str::contains("[\"-g\", \"-O2\"]"))
    .stdout(predicate::str::contains("+ serde"))
    .stdout(predicate::str::contains("scratch").not());
}

#[test]
fn report_as_json() {
  let temp = temp_model(MODEL);

  let output = cfgraph_cmd()
    .arg("report")
    .arg(temp.path().join("model.json"))
    .args(["--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let nodes = report["nodes"].as_array().unwrap();
  let project = nodes.iter().find(|node| node["path"] == "project").unwrap();
  assert_eq!(project["state"], "graph-closed");
  assert_eq!(project["value"], "\"copied\"");
}

#[test]
fn report_stops_at_requested_state() {
  let temp = temp_model(MODEL);

  let output = cfgraph_cmd()
    .arg("report")
    .arg(temp.path().join("model.json"))
    .args(["--state", "created", "--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let nodes = report["nodes"].as_array().unwrap();
  let flags = nodes.iter().find(|node| node["path"] == "flags").unwrap();
  assert_eq!(flags["state"], "created");
  assert_eq!(flags["value"], "[\"-g\"]");
}

#[test]
fn report_rejects_unknown_state() {
  let temp = temp_model(MODEL);

  cfgraph_cmd()
    .arg("report")
    .arg(temp.path().join("model.json"))
    .args(["--state", "done"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown node state 'done'"));
}

#[test]
fn report_missing_file_fails() {
  let temp = TempDir::new().unwrap();

  cfgraph_cmd()
    .arg("report")
    .arg(temp.path().join("missing.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read model file"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn check_accepts_consistent_model() {
  let temp = temp_model(MODEL);

  cfgraph_cmd()
    .arg("check")
    .arg(temp.path().join("model.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("is consistent"));
}

#[test]
fn check_reports_unbound_rules() {
  let temp = temp_model(UNBOUND_MODEL);

  cfgraph_cmd()
    .arg("check")
    .arg(temp.path().join("model.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("subject 'missing' does not exist"));
}

#[test]
fn check_reports_cycles() {
  let temp = temp_model(CYCLIC_MODEL);

  cfgraph_cmd()
    .arg("check")
    .arg(temp.path().join("model.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("a -> b -> a"));
}
