// crates/results-gate-config/src/lib.rs
// ============================================================================
// Module: Results Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for results-gate.toml semantics.
// Dependencies: results-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `results-gate-config` defines the configuration model for the results
//! authorization gate: listener, identity extraction, RBAC authority, decision
//! cache, and in-process RBAC rules. Validation is strict and fail-closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::PLACEHOLDER_TOKEN_PREFIX;
pub use examples::config_toml_example;
