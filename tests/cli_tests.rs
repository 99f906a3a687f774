//! Integration tests for the Toolflow CLI
//!
//! These tests run the actual CLI binary and verify output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the binary to test
fn toolflow_cmd() -> Command {
    let mut cmd = Command::cargo_bin("toolflow").unwrap();
    cmd.env_remove("TOOLFLOW_CONFIG");
    cmd
}

const VALID: &str = r#"{
  "name": "weather_report",
  "description": "Fetch weather and notify",
  "version": "1.0.0",
  "inputs": [
    {"name": "city", "type": "string", "example": "Paris"},
    {"name": "weather_api_key", "type": "string"}
  ],
  "outputs": [{"name": "report", "type": "object"}],
  "workflow": {
    "type": "sequential",
    "steps": [
      {"type": "tool_call", "tool": "get_weather",
       "params": {"city": "{{city}}", "api_key": "{{weather_api_key}}"},
       "output": "weather"},
      {"type": "conditional", "condition": "{{weather.temp}} > 30",
       "if_true": {"type": "tool_call", "tool": "send_alert",
                   "params": {"text": "Hot in {{city}}"}, "output": "report"},
       "if_false": {"type": "tool_call", "tool": "log_weather",
                    "params": {"data": "{{weather}}"}, "output": "report"}}
    ]
  }
}"#;

const INVALID: &str = r#"{
  "name": "Broken Flow",
  "version": "1.0",
  "inputs": [],
  "workflow": {
    "type": "sequential",
    "steps": [
      {"type": "tool_call", "tool": "fetch", "params": {"q": "{{missing}}"}},
      {"type": "conditional", "condition": "eval('1') == 1",
       "if_true": {"type": "tool_call", "tool": "a"}}
    ]
  }
}"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_flag() {
    toolflow_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_check_valid_workflow() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);

    toolflow_cmd()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_check_reports_every_error() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "broken.json", INVALID);

    toolflow_cmd()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("rejected"))
        .stderr(predicate::str::contains("NamingError"))
        .stderr(predicate::str::contains("ConditionError"))
        .stderr(predicate::str::contains("ScopeError"))
        .stderr(predicate::str::contains("workflow.steps[0].params.q"));
}

#[test]
fn test_check_json_report() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "broken.json", INVALID);

    let output = toolflow_cmd()
        .args(["check", "--json", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let errors = report["errors"].as_array().unwrap();
    assert!(errors.len() >= 4);
    assert!(errors.iter().any(|e| e["path"] == "version"));
    assert!(errors.iter().any(|e| e["kind"] == "scope"));
}

#[test]
fn test_check_yaml_document() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "flow.yaml",
        r#"
name: hello
version: 0.1.0
inputs:
  - name: who
    type: string
workflow:
  type: tool_call
  tool: greet
  params:
    name: "{{who}}"
"#,
    );

    toolflow_cmd()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn test_check_unparseable_document() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "bad.json", "{ nope");

    toolflow_cmd()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TF-001"));
}

#[test]
fn test_check_missing_file() {
    toolflow_cmd()
        .args(["check", "/nonexistent/flow.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TF-002"));
}

#[test]
fn test_compile_to_stdout() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);

    toolflow_cmd()
        .args(["compile", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("def run_workflow(**inputs):"))
        .stdout(predicate::str::contains("def tool_get_weather(**kwargs):"))
        .stdout(predicate::str::contains("os.environ.get(\"WEATHER_API_KEY\")"))
        .stderr(predicate::str::contains("Tools: get_weather, log_weather, send_alert"))
        .stderr(predicate::str::contains("weather_api_key"));
}

#[test]
fn test_compile_to_file_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);
    let first = dir.path().join("a.py");
    let second = dir.path().join("b.py");

    for out in [&first, &second] {
        toolflow_cmd()
            .args(["compile", file.to_str().unwrap(), "-o", out.to_str().unwrap()])
            .assert()
            .success();
    }

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_compile_invalid_prints_feedback() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "broken.json", INVALID);

    toolflow_cmd()
        .args(["compile", file.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("TF-010"))
        .stderr(predicate::str::contains("'missing'"));
}

#[test]
fn test_compile_with_library_config() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);
    let config = write(
        &dir,
        "toolflow.toml",
        "[library.get_weather]\nmodule = \"acme.weather\"\nfunction = \"current\"\n",
    );

    toolflow_cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "compile",
            file.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("_delegate(\"acme.weather\", \"current\", kwargs)"));
}

#[test]
fn test_config_from_env_var() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);
    let config = write(&dir, "limits.toml", "[limits]\nmax_sequence_len = 1\n");

    Command::cargo_bin("toolflow")
        .unwrap()
        .env("TOOLFLOW_CONFIG", &config)
        .args(["check", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ComplexityError"));
}

#[test]
fn test_tools_lists_sorted_names() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);

    toolflow_cmd()
        .args(["tools", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_match("(?s)get_weather.*log_weather.*send_alert").unwrap());
}

#[test]
fn test_fmt_is_canonical() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "flow.json", VALID);

    let first = toolflow_cmd()
        .args(["fmt", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(first.status.success());

    let formatted = write(&dir, "formatted.json", std::str::from_utf8(&first.stdout).unwrap());
    let second = toolflow_cmd()
        .args(["fmt", formatted.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(first.stdout, second.stdout);
    assert!(!String::from_utf8_lossy(&first.stdout).contains("is_secret"));
}
