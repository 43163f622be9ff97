//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "reclaim-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Reclaim Idle Resource"),
        "Should show app name"
    );
    assert!(stdout.contains("policy"), "Should show policy command");
    assert!(stdout.contains("usage"), "Should show usage command");
    assert!(stdout.contains("check"), "Should show check command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("reclaimctl"), "Should show binary name");
}

/// Test usage subcommand help
#[test]
fn test_usage_help() {
    let output = run_cli(&["usage", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Usage help should succeed");
    assert!(stdout.contains("--pod"), "Should show pod option");
    assert!(stdout.contains("--namespace"), "Should show namespace option");
    assert!(stdout.contains("--resource"), "Should show resource option");
    assert!(stdout.contains("--window"), "Should show window option");
}

/// Test check subcommand help
#[test]
fn test_check_help() {
    let output = run_cli(&["check", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Check help should succeed");
    assert!(
        stdout.contains("--priority-class"),
        "Should show priority-class option"
    );
}

/// Test format option
#[test]
fn test_format_option() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("KUBECONFIG"), "Should show kubeconfig env var");
}

/// Test invalid resource type error handling
#[test]
fn test_invalid_resource() {
    let output = run_cli(&["usage", "--pod", "p", "--resource", "memory"]);

    assert!(!output.status.success(), "Unknown resource should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unknown resource type"),
        "Should explain the invalid resource"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = run_cli(&["policy"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
