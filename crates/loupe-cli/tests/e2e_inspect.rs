//! E2E tests for the read-only inspection commands.
//!
//! Covers `loupe details`, `loupe history`, `loupe vv` and `loupe graph` in
//! JSON, text and DOT output, plus config-file defaults and load errors.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Peer 1 writes four ops, peer 2 branches from 1@1 with three ops, then
/// peer 1 merges 2@2 with two more ops.
const BRANCH_AND_MERGE: &str = r#"{
  "name": "notes",
  "changes": [
    {"peer": 1, "counter": 0, "length": 4, "timestamp": 1700000000, "message": "init"},
    {"peer": 2, "counter": 0, "length": 3, "timestamp": 1700000100,
     "deps": [{"peer": 1, "counter": 1}], "message": "branch"},
    {"peer": 1, "counter": 4, "length": 2, "timestamp": 1700000200,
     "deps": [{"peer": 2, "counter": 2}], "message": "merge"}
  ]
}"#;

fn loupe_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("loupe"));
    cmd.current_dir(dir);
    cmd.env("LOUPE_LOG", "error");
    cmd.env("LOUPE_CONFIG", dir.join("config.toml"));
    cmd.env_remove("FORMAT");
    cmd
}

fn write_doc(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).expect("write fixture");
    path
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = loupe_cmd(dir)
        .args(args)
        .args(["--format", "json"])
        .output()
        .expect("loupe should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

#[test]
fn details_summarizes_the_document() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    let json = run_json(dir.path(), &["details", "doc.json"]);
    assert_eq!(json["name"], "notes");
    assert_eq!(json["change_count"], 3);
    assert_eq!(json["op_count"], 9);
    assert_eq!(json["peer_count"], 2);
    assert_eq!(json["start_time"], "2023-11-14T22:13:20+00:00");
    assert_eq!(json["logged_frontier"], serde_json::json!(["5@1"]));
    assert_eq!(json["current_frontier"], serde_json::json!(["5@1"]));
    assert_eq!(json["detached"], false);
    assert_eq!(
        json["logged_version_vector"],
        serde_json::json!([{"peer": "1", "counter": 6}, {"peer": "2", "counter": 3}])
    );
    assert!(json["size_bytes"].as_u64().expect("size") > 0);
}

#[test]
fn details_reads_stdin_for_dash() {
    let dir = TempDir::new().expect("tempdir");

    let output = loupe_cmd(dir.path())
        .args(["details", "-", "--format", "json"])
        .write_stdin(BRANCH_AND_MERGE)
        .output()
        .expect("details should not crash");
    assert!(
        output.status.success(),
        "details - failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["name"], "notes");
    assert_eq!(json["op_count"], 9);
    assert_eq!(json["size_bytes"], BRANCH_AND_MERGE.len());
}

#[test]
fn unnamed_stdin_document_is_called_stdin() {
    let dir = TempDir::new().expect("tempdir");

    let output = loupe_cmd(dir.path())
        .args(["details", "-", "--format", "json"])
        .write_stdin(r#"{"changes": [{"peer": 1, "counter": 0, "length": 2}]}"#)
        .output()
        .expect("details should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["name"], "stdin");

    loupe_cmd(dir.path())
        .args(["vv", "-", "--format", "json"])
        .write_stdin("not json at all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2101"));
}

#[test]
fn details_reports_a_detached_checkout() {
    let dir = TempDir::new().expect("tempdir");
    let detached = BRANCH_AND_MERGE.replacen(
        "\"changes\"",
        "\"frontier\": [{\"peer\": 2, \"counter\": 1}],\n  \"changes\"",
        1,
    );
    write_doc(dir.path(), "doc.json", &detached);

    let json = run_json(dir.path(), &["details", "doc.json"]);
    assert_eq!(json["detached"], true);
    assert_eq!(json["current_frontier"], serde_json::json!(["1@2"]));
    assert_eq!(
        json["current_version_vector"],
        serde_json::json!([{"peer": "1", "counter": 2}, {"peer": "2", "counter": 2}])
    );
}

#[test]
fn history_lists_newest_first() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    let json = run_json(dir.path(), &["history", "doc.json"]);
    assert_eq!(json["total"], 3);
    let ids: Vec<&str> = json["changes"]
        .as_array()
        .expect("changes array")
        .iter()
        .map(|c| c["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, vec!["4@1", "0@2", "0@1"]);
    assert_eq!(json["changes"][0]["lamport"], 5);
    assert_eq!(json["changes"][1]["deps"], serde_json::json!(["1@1"]));
}

#[test]
fn history_search_by_peer_op_and_message() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    let by_peer = run_json(dir.path(), &["history", "doc.json", "--search", "2"]);
    assert_eq!(by_peer["matched"], 1);
    assert_eq!(by_peer["changes"][0]["id"], "0@2");

    let by_op = run_json(dir.path(), &["history", "doc.json", "-s", "5@1"]);
    assert_eq!(by_op["matched"], 1);
    assert_eq!(by_op["changes"][0]["id"], "4@1");

    let by_message = run_json(dir.path(), &["history", "doc.json", "-s", "BRANCH"]);
    assert_eq!(by_message["changes"][0]["message"], "branch");

    let nothing = run_json(dir.path(), &["history", "doc.json", "-s", "zzz"]);
    assert_eq!(nothing["matched"], 0);
    assert_eq!(nothing["total"], 3);
}

#[test]
fn history_limit_and_text_rows() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    loupe_cmd(dir.path())
        .args(["history", "doc.json", "-n", "1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("4@1\t2\t5\t"))
        .stdout(predicate::str::contains("0@1").not());
}

#[test]
fn vv_shows_logged_and_current() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    let logged = run_json(dir.path(), &["vv", "doc.json"]);
    assert_eq!(logged["version"], "logged");
    assert_eq!(logged["total_ops"], 9);

    let current = run_json(dir.path(), &["vv", "doc.json", "--current"]);
    assert_eq!(current["version"], "current");
    assert_eq!(current["entries"], logged["entries"]);

    loupe_cmd(dir.path())
        .args(["vv", "doc.json", "--format", "text"])
        .assert()
        .success()
        .stdout("1\t6\n2\t3\n");
}

#[test]
fn graph_json_has_nodes_and_edges() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    let json = run_json(dir.path(), &["graph", "doc.json"]);
    assert_eq!(json["total_changes"], 3);
    assert_eq!(json["merged_changes"], 0);
    assert_eq!(json["node_count"], 3);
    assert_eq!(json["edge_count"], 3);
    assert_eq!(
        json["edges"],
        serde_json::json!([
            {"from": "1_3", "to": "1_5"},
            {"from": "1_3", "to": "2_2"},
            {"from": "2_2", "to": "1_5"}
        ])
    );
}

#[test]
fn graph_merges_linear_chains() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(
        dir.path(),
        "linear.json",
        r#"{"changes": [
            {"peer": 7, "counter": 0, "length": 2},
            {"peer": 7, "counter": 2, "length": 3},
            {"peer": 7, "counter": 5, "length": 1}
        ]}"#,
    );

    let merged = run_json(dir.path(), &["graph", "linear.json"]);
    assert_eq!(merged["node_count"], 1);
    assert_eq!(merged["merged_changes"], 2);
    assert_eq!(merged["nodes"][0]["id"], "7_5");
    assert_eq!(merged["nodes"][0]["length"], 6);

    let unmerged = run_json(dir.path(), &["graph", "linear.json", "--no-merge"]);
    assert_eq!(unmerged["node_count"], 3);
    assert_eq!(unmerged["edge_count"], 2);
}

#[test]
fn graph_dot_output() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);

    loupe_cmd(dir.path())
        .args(["graph", "doc.json", "--dot", "--direction", "lr"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph changes {"))
        .stdout(predicate::str::contains("rankdir=LR;"))
        .stdout(predicate::str::contains("\"1_3\" -> \"2_2\";"));
}

#[test]
fn config_file_sets_defaults() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);
    std::fs::write(
        dir.path().join("config.toml"),
        "[graph]\ndirection = \"lr\"\n\n[output]\nformat = \"json\"\n",
    )
    .expect("write config");

    loupe_cmd(dir.path())
        .args(["graph", "doc.json", "--dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rankdir=LR;"));

    let output = loupe_cmd(dir.path())
        .args(["vv", "doc.json"])
        .output()
        .expect("vv should not crash");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("config selects JSON");
    assert_eq!(json["total_ops"], 9);
}

#[test]
fn broken_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "doc.json", BRANCH_AND_MERGE);
    std::fs::write(dir.path().join("config.toml"), "[graph\n").expect("write config");

    loupe_cmd(dir.path())
        .args(["vv", "doc.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}

#[test]
fn malformed_document_reports_error_code() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(dir.path(), "bad.json", "not json at all");

    loupe_cmd(dir.path())
        .args(["details", "bad.json", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E2101\""));
}

#[test]
fn counter_gap_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    write_doc(
        dir.path(),
        "gap.json",
        r#"{"changes": [
            {"peer": 1, "counter": 0, "length": 2},
            {"peer": 1, "counter": 5, "length": 1}
        ]}"#,
    );

    loupe_cmd(dir.path())
        .args(["history", "gap.json", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected a change at counter 2"));
}

#[test]
fn missing_file_reports_read_error() {
    let dir = TempDir::new().expect("tempdir");

    loupe_cmd(dir.path())
        .args(["vv", "missing.json", "--format", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1101"));
}
