// crates/results-gate-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults Tests
// Description: Default values and example configuration checks.
// Purpose: Ensure an empty config is valid and fails closed.
// =============================================================================

//! Default value tests for results-gate-config.

use results_gate_config::AuthMode;
use results_gate_config::AuthorityMode;
use results_gate_config::config_toml_example;

mod common;

use common::TestResult;

#[test]
fn empty_config_uses_fail_closed_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.bind != "127.0.0.1:50051" {
        return Err(format!("unexpected bind {}", config.server.bind));
    }
    if config.auth.mode != AuthMode::BearerClaims {
        return Err("default auth mode should be bearer_claims".to_string());
    }
    // Static authority with no bindings denies everything.
    if config.authority.mode != AuthorityMode::Static || !config.rbac.is_empty() {
        return Err("default authority should be static with no rules".to_string());
    }
    if !config.gate.cache.enabled || config.gate.cache.allow_ttl_ms == 0 {
        return Err("cache should be enabled by default".to_string());
    }
    if !config.server.audit.enabled {
        return Err("audit should be enabled by default".to_string());
    }
    Ok(())
}

#[test]
fn example_config_validates() -> TestResult {
    let config =
        common::config_from_toml(&config_toml_example()).map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.auth.tokens.len() != 2 || config.rbac.roles.len() != 2 {
        return Err("example should define tokens and roles".to_string());
    }
    Ok(())
}

#[test]
fn unknown_auth_mode_is_parse_error() {
    let result = common::config_from_toml("[auth]\nmode = \"anonymous\"\n");
    assert!(result.is_err());
}
