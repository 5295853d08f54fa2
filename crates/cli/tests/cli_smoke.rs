use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn router(store: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("router"));
    cmd.env_remove("ROUTER_CONFIG")
        .env_remove("ROUTER_RULES")
        .arg("--quiet")
        .arg("--store")
        .arg(store);
    cmd
}

fn write_context(dir: &Path, raw: &str) -> std::path::PathBuf {
    let path = dir.join("context.json");
    std::fs::write(&path, raw).unwrap();
    path
}

fn stdout_json(output: std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn route_prints_a_routed_decision() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("feedback.json");
    let context = write_context(
        dir.path(),
        r#"{"git": "modified", "diagnostics": {"type_errors": 5}, "file_mix": {"ts": 40}}"#,
    );

    let output = router(&store)
        .args(["route", "fix typescript errors", "--context"])
        .arg(&context)
        .output()
        .unwrap();
    let response = stdout_json(output);

    assert_eq!(response["outcome"]["kind"], "routed");
    assert_eq!(
        response["outcome"]["decision"]["actions"][0]["action"],
        "fix-types"
    );
    assert_eq!(response["state"], "plan_built");
    assert!(store.exists());
}

#[test]
fn clarification_round_trip_through_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("feedback.json");
    let state = dir.path().join("session.json");
    let context = write_context(
        dir.path(),
        r#"{"git": "clean", "diagnostics": {}, "file_mix": {"ts": 40}}"#,
    );

    let output = router(&store)
        .args(["route", "fix the bug", "--context"])
        .arg(&context)
        .arg("--save-state")
        .arg(&state)
        .output()
        .unwrap();
    let response = stdout_json(output);
    assert_eq!(response["outcome"]["kind"], "clarification");
    assert_eq!(
        response["outcome"]["suspended"]["clarification"]["reason"],
        "ambiguous"
    );
    assert!(state.exists());

    let output = router(&store)
        .args(["resume", "--state"])
        .arg(&state)
        .arg("fix-lint")
        .output()
        .unwrap();
    let resumed = stdout_json(output);
    assert_eq!(resumed["session_id"], response["session_id"]);
    assert_eq!(
        resumed["outcome"]["decision"]["actions"][0]["action"],
        "fix-lint"
    );
    assert!(!state.exists());
}

#[test]
fn correction_shows_up_in_weights() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("feedback.json");
    let context = write_context(
        dir.path(),
        r#"{"git": "clean", "diagnostics": {}, "file_mix": {"ts": 40}}"#,
    );

    let output = router(&store)
        .args(["route", "review my changes", "--context"])
        .arg(&context)
        .output()
        .unwrap();
    let response = stdout_json(output);
    let decision_id = response["session_id"].as_str().unwrap().to_string();

    router(&store)
        .args(["feedback", "--decision", &decision_id, "--outcome", "corrected"])
        .args(["--corrected-action", "security-review"])
        .assert()
        .success();

    let output = router(&store).arg("weights").output().unwrap();
    let weights = stdout_json(output);
    let entries = weights["entries"].as_array().unwrap();
    let security = entries
        .iter()
        .find(|e| e["action"] == "security-review")
        .unwrap();
    assert!(security["delta"].as_f64().unwrap() > 0.0);
    assert_eq!(weights["pending"], 0);
}

#[test]
fn correction_without_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    router(&dir.path().join("feedback.json"))
        .args(["feedback", "--decision", "d1", "--outcome", "corrected"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--corrected-action"));
}

#[test]
fn unknown_decision_fails() {
    let dir = tempfile::tempdir().unwrap();
    router(&dir.path().join("feedback.json"))
        .args(["feedback", "--decision", "nope", "--outcome", "accepted"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn rules_lists_builtin_table() {
    let dir = tempfile::tempdir().unwrap();
    let output = router(&dir.path().join("feedback.json"))
        .arg("rules")
        .output()
        .unwrap();
    let listing = stdout_json(output);
    assert_eq!(listing["source"], "builtin");
    assert!(listing["rules"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["action"] == "git-commit" && r["gated"] == true));
}

#[test]
fn rules_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("rules.toml");
    std::fs::write(&table, "schema_version = 9\n").unwrap();

    router(&dir.path().join("feedback.json"))
        .args(["rules", "--file"])
        .arg(&table)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid rule table"));
}

#[test]
fn json_flag_keeps_info_logs_off_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("feedback.json");
    let context = write_context(
        dir.path(),
        r#"{"git": "modified", "diagnostics": {"type_errors": 5}, "file_mix": {"TS": 40}}"#,
    );

    let output = Command::new(assert_cmd::cargo::cargo_bin!("router"))
        .env_remove("ROUTER_CONFIG")
        .env_remove("ROUTER_RULES")
        .env_remove("RUST_LOG")
        .arg("--json")
        .arg("--store")
        .arg(&store)
        .args(["route", "fix typescript errors", "--context"])
        .arg(&context)
        .output()
        .unwrap();
    assert!(output.stderr.is_empty(), "{}", String::from_utf8_lossy(&output.stderr));
    let response = stdout_json(output);
    let rationale = &response["outcome"]["decision"]["rationale"][0];
    assert_eq!(rationale["action"], "fix-types");
    let fired: Vec<&str> = rationale["adjustments"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["adjustment"].as_str())
        .collect();
    assert!(fired.contains(&"context-confirms-intent"));

    // Upper-case extension in the context file still confirms the TypeScript specialist.
    let lang = response["outcome"]["decision"]["alternatives"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["action"] == "lang-typescript")
        .unwrap();
    assert_eq!(lang["confidence"].as_f64().unwrap(), 1.0);
}

#[test]
fn bad_urgency_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    router(&dir.path().join("feedback.json"))
        .args(["route", "fix it", "--urgency", "whenever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown urgency"));
}
