//! Integration tests for the AquaRoute CLI

use std::process::Command;

fn aquaroute() -> Command {
    Command::new(env!("CARGO_BIN_EXE_aquaroute"))
}

/// Test that the CLI shows help with explicit help flag
#[test]
fn test_cli_help() {
    let output = aquaroute()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aquaroute"));
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("route"));
    assert!(stdout.contains("ingest"));
}

/// Test that a subcommand is required
#[test]
fn test_cli_requires_subcommand() {
    let output = aquaroute().output().expect("Failed to execute command");
    assert!(!output.status.success());
}

/// Test that malformed coordinates are rejected before anything runs
#[test]
fn test_route_rejects_malformed_coordinates() {
    let output = aquaroute()
        .args(["route", "--from", "18.9", "--to", "22.5,69.8"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("expected 2 comma-separated values"));
}

/// Test that an unknown ingestion mode is rejected
#[test]
fn test_ingest_rejects_unknown_mode() {
    let output = aquaroute()
        .args(["ingest", "--mode", "tiles"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown ingestion mode"));
}

/// Config pointing the grid store into `dir` and the weather client at a closed port
fn offline_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let cache = dir.path().join("grid");
    std::fs::write(
        &path,
        format!(
            r#"
[weather]
api_key = "offline_key"
base_url = "http://127.0.0.1:1/data/2.5/weather"
timeout_seconds = 2

[cache]
location = "{}"
"#,
            cache.display()
        ),
    )
    .expect("Failed to write config");
    path
}

/// Test that a rejected route exits with the client-error code
#[test]
fn test_route_out_of_range_exits_with_client_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = offline_config(&dir);

    let output = aquaroute()
        .arg("--config")
        .arg(&config)
        .args(["route", "--from", "95.0,0.0", "--to", "22.5,69.8"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid coordinates"));
}

/// Test that band mode stays inside the requested region
#[test]
fn test_ingest_bands_respects_region() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = offline_config(&dir);

    let output = aquaroute()
        .arg("--config")
        .arg(&config)
        .args(["ingest", "--region", "-0.1,0.0,0.1,0.2", "--mode", "bands"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("9 cells enumerated, 0 written, 9 dropped in 2 batches"),
        "{stdout}"
    );
}
