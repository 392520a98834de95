// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for xtask subcommands.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)] // cargo_bin works fine; the replacement macro is unstable
fn xtask() -> Command {
    Command::cargo_bin("xtask").unwrap()
}

#[test]
fn schema_subcommand_exists() {
    xtask()
        .arg("schema")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--out-dir"));
}

#[test]
fn schema_writes_both_schemas() {
    let tmp = tempfile::tempdir().unwrap();
    xtask()
        .arg("schema")
        .arg("--out-dir")
        .arg(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("wrote schemas"));

    for (name, property) in [
        ("graph_document.schema.json", "rules"),
        ("fuzz_config.schema.json", "strategy"),
    ] {
        let content = std::fs::read_to_string(tmp.path().join(name)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(value["$schema"].is_string(), "{name} missing $schema");
        assert!(value["properties"][property].is_object(), "{name} missing {property}");
    }
}

#[test]
fn unknown_subcommand_fails() {
    xtask().arg("release").assert().failure();
}
