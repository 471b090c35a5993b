//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory holding a
//! small catalog snapshot.

use std::path::Path;
use std::process::Command;

use serde_json::json;
use tempfile::TempDir;

fn session(id: &str, code: &str, days: &str, time: &str, count: u32) -> serde_json::Value {
    json!({
        "id": id,
        "code": code,
        "term_id": "2025-au",
        "meetings": [{ "days": days, "time": time }],
        "enroll_count": count,
        "enroll_maximum": 30
    })
}

fn data_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let catalog = json!({
        "offerings": [
            {
                "course_id": "c-cse142",
                "course_code": "CSE 142",
                "course_credit": "4",
                "term_id": "2025-au",
                "sessions": [
                    session("1001", "A", "MWF", "09:30-10:20", 10),
                    session("1002", "AA", "T", "08:30-09:20", 10),
                    session("1003", "AB", "T", "09:30-10:20", 10),
                    session("1004", "B", "MWF", "13:30-14:20", 10),
                    session("1005", "BA", "Th", "12:30-13:20", 10)
                ]
            },
            {
                "course_id": "c-math124",
                "course_code": "MATH 124",
                "course_credit": "5",
                "term_id": "2025-au",
                "sessions": [
                    session("2001", "A", "MWF", "09:30-10:20", 10),
                    session("2002", "B", "MWF", "11:30-12:20", 30)
                ]
            },
            {
                "course_id": "c-phys121",
                "course_code": "PHYS 121",
                "course_credit": "5",
                "term_id": "2025-au",
                "sessions": [
                    session("3001", "A", "TTh", "10:30-11:50", 10),
                    session("3002", "AA", "W", "14:30-15:20", 30)
                ]
            }
        ]
    });
    std::fs::write(
        dir.path().join("catalog.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();
    dir
}

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_courseplan"))
        .env("COURSEPLAN_DATA_DIR", dir)
        .env_remove("COURSEPLAN_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn plan_json(dir: &Path) -> serde_json::Value {
    let (code, stdout, _) = run_cli(dir, &["plan", "list", "--json"]);
    assert_eq!(code, 0);
    serde_json::from_str(&stdout).unwrap()
}

fn scheduled_ids(plan: &serde_json::Value) -> Vec<String> {
    let mut ids: Vec<String> = plan["courses"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|c| c["sessions"].as_array().unwrap().iter())
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[test]
fn test_catalog_show() {
    let dir = data_dir();
    let (code, stdout, _) = run_cli(dir.path(), &["catalog", "show", "--course", "cse 142"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("CSE 142 (2025-au)"));
    assert!(stdout.contains("AA"));
    assert!(!stdout.contains("MATH 124"));
}

#[test]
fn test_missing_catalog_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["catalog", "show"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no catalog"));
}

#[test]
fn test_add_secondary_brings_primary() {
    let dir = data_dir();
    let (code, stdout, _) = run_cli(dir.path(), &["plan", "add", "CSE 142", "AA"]);
    assert_eq!(code, 0, "add failed: {stdout}");
    assert!(stdout.contains("+ 1001"));
    assert!(stdout.contains("+ 1002"));
    assert_eq!(scheduled_ids(&plan_json(dir.path())), vec!["1001", "1002"]);
}

#[test]
fn test_conflicting_add_is_rejected() {
    let dir = data_dir();
    assert_eq!(run_cli(dir.path(), &["plan", "add", "CSE 142", "A"]).0, 0);

    let (code, _, stderr) = run_cli(dir.path(), &["plan", "add", "MATH 124", "A"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("time conflict with CSE 142 A"));
    assert!(stderr.contains("[time-conflict]"));
    assert_eq!(scheduled_ids(&plan_json(dir.path())), vec!["1001"]);
}

#[test]
fn test_occupied_slot_suggests_switch() {
    let dir = data_dir();
    assert_eq!(run_cli(dir.path(), &["plan", "add", "CSE 142", "A"]).0, 0);

    let (code, _, stderr) = run_cli(dir.path(), &["plan", "add", "CSE 142", "B"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("plan switch"));

    let (code, stdout, _) = run_cli(dir.path(), &["plan", "switch", "CSE 142", "A", "B"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("+ 1004"));
    assert!(stdout.contains("- 1001"));
    assert_eq!(scheduled_ids(&plan_json(dir.path())), vec!["1004"]);
}

#[test]
fn test_remove_primary_cascades() {
    let dir = data_dir();
    assert_eq!(run_cli(dir.path(), &["plan", "add", "CSE 142", "AB"]).0, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["plan", "remove", "CSE 142", "A"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("- 1001"));
    assert!(stdout.contains("- 1003"));
    assert!(scheduled_ids(&plan_json(dir.path())).is_empty());
}

#[test]
fn test_generate_explicit_courses() {
    let dir = data_dir();
    let (code, stdout, _) = run_cli(
        dir.path(),
        &["generate", "--course", "CSE 142", "--course", "MATH 124", "--json"],
    );
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let variants = parsed["variants"].as_array().unwrap();
    assert!(!variants.is_empty());
    assert_eq!(variants[0]["id"], "variant-1");
    assert_eq!(parsed["report"]["stop"], "exhausted");
}

#[test]
fn test_generate_reports_infeasible() {
    let dir = data_dir();
    // MATH 124 B is full, leaving only A, which collides with CSE 142 A.
    assert_eq!(run_cli(dir.path(), &["plan", "add", "CSE 142", "AA"]).0, 0);
    assert_eq!(run_cli(dir.path(), &["plan", "track", "MATH 124"]).0, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["generate"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No conflict-free schedule."));
    assert!(stdout.contains("MATH 124 conflicts with CSE 142"));

    let (code, stdout, _) = run_cli(dir.path(), &["generate", "--include-closed", "--apply", "1"]);
    assert_eq!(code, 0, "apply failed: {stdout}");
    assert_eq!(
        scheduled_ids(&plan_json(dir.path())),
        vec!["1001", "1002", "2002"]
    );
}

#[test]
fn test_generate_with_full_quiz_sections_keeps_lecture() {
    let dir = data_dir();
    let (code, stdout, _) = run_cli(dir.path(), &["generate", "--course", "PHYS 121", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let variants = parsed["variants"].as_array().unwrap();
    assert_eq!(variants.len(), 1);
    let assignment = &variants[0]["assignments"][0];
    assert_eq!(assignment["primary"]["id"], "3001");
    assert!(assignment["secondary"].is_null());
}

#[test]
fn test_generate_pins_respect_configured_limit() {
    let dir = data_dir();
    assert_eq!(
        run_cli(dir.path(), &["config", "set", "plan.max_pinned_variants", "1"]).0,
        0
    );

    let (code, stdout, _) = run_cli(
        dir.path(),
        &["generate", "--course", "CSE 142", "--pin", "2", "--json"],
    );
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["variants"].as_array().unwrap().len(), 3);
    assert_eq!(parsed["pinned"], json!(["variant-2"]));

    let (code, stdout, _) = run_cli(dir.path(), &["generate", "--course", "CSE 142", "--pin", "2"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("variant-2 (score 2) [pinned]"));

    let (code, _, stderr) = run_cli(
        dir.path(),
        &["generate", "--course", "CSE 142", "--pin", "1", "--pin", "2"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("at most 1 variants can be pinned"));
}

#[test]
fn test_credits_override() {
    let dir = data_dir();
    assert_eq!(run_cli(dir.path(), &["plan", "add", "CSE 142", "A"]).0, 0);
    assert_eq!(
        run_cli(dir.path(), &["plan", "credits", "--course", "CSE 142", "--set", "3"]).0,
        0
    );
    let (code, stdout, _) = run_cli(dir.path(), &["plan", "credits"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("3*"));
    assert!(stdout.contains("total        3"));
}

#[test]
fn test_config_set_and_get() {
    let dir = data_dir();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "set", "generation.limit", "5"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("ok"));

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "generation.limit"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");

    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}
