// crates/results-gate-config/tests/load.rs
// =============================================================================
// Module: Config Load Tests
// Description: File-level loading checks for results-gate.toml.
// Purpose: Ensure size, encoding, and parse failures are reported distinctly.
// =============================================================================

//! Loading tests for results-gate-config.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::fs;

use results_gate_config::ConfigError;
use results_gate_config::PLACEHOLDER_TOKEN_PREFIX;
use results_gate_config::ResultsGateConfig;
use results_gate_config::config_toml_example;

#[test]
fn loads_example_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results-gate.toml");
    fs::write(&path, config_toml_example()).unwrap();
    let config = ResultsGateConfig::load(Some(&path)).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:50051");
    for entry in &config.auth.tokens {
        assert!(entry.token.starts_with(PLACEHOLDER_TOKEN_PREFIX), "{}", entry.subject);
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ResultsGateConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn oversized_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).unwrap();
    let err = ResultsGateConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("size limit"));
}

#[test]
fn non_utf8_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
    let err = ResultsGateConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("utf-8"));
}

#[test]
fn malformed_toml_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[server\nbind = 1").unwrap();
    let err = ResultsGateConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn invalid_values_fail_validation_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invalid.toml");
    fs::write(&path, "[gate]\ncall_timeout_ms = 0\n").unwrap();
    let err = ResultsGateConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
