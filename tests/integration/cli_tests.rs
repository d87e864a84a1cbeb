use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn lexika() -> Command {
    Command::cargo_bin("lexika").expect("binary built")
}

#[test]
fn test_search_finds_demo_vocabulary() {
    lexika()
        .args(["--quiet", "search", "dog pet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hund"));
}

#[test]
fn test_search_json_output_parses() {
    let output = lexika()
        .args(["--quiet", "--json", "search", "dog pet"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: Value = serde_json::from_slice(&output).expect("valid JSON");
    assert!(parsed["results"].is_array());
    assert!(parsed["source"].is_string());
}

#[test]
fn test_review_reports_updated_card() {
    lexika()
        .args(["--quiet", "review", "hund", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interval 1.0d"));
}

#[test]
fn test_unknown_collection_fails() {
    lexika()
        .args(["--quiet", "search", "dog", "--collection", "paintings"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown collection"));
}

#[test]
fn test_unknown_collection_json_error_envelope() {
    let output = lexika()
        .args(["--quiet", "--json", "search", "dog", "--collection", "paintings"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let parsed: Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(parsed["error"], Value::Bool(true));
    assert_eq!(parsed["code"], Value::String("invalid_query".to_string()));
}

#[test]
fn test_stats_json() {
    let output = lexika()
        .args(["--quiet", "--json", "stats"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(parsed["indexed_items"], Value::from(8));
    assert_eq!(parsed["graph_nodes"], Value::from(8));
}

#[test]
fn test_related_lists_graph_neighbors() {
    lexika()
        .args(["--quiet", "related", "hund"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wolf"));
}
