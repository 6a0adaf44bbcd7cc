// crates/results-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `results-gate.toml`. The example uses the static
//! authority so it validates without a cluster; the Kubernetes section is
//! shown commented out. It binds to loopback and its static tokens carry
//! [`PLACEHOLDER_TOKEN_PREFIX`] so a copied example is flagged at startup.

/// Prefix marking example bearer tokens that must be replaced before use.
pub const PLACEHOLDER_TOKEN_PREFIX: &str = "REPLACE-ME-";

/// Returns a canonical example `results-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:50051"
max_body_bytes = 1048576

# [server.tls]
# cert_path = "/etc/tls/tls.crt"
# key_path = "/etc/tls/tls.key"

[server.audit]
enabled = true
# path = "/var/log/results-gate/audit.jsonl"

[auth]
mode = "static_tokens"
leeway_secs = 60

# Placeholder tokens: replace with secrets from your deployment.
[[auth.tokens]]
token = "REPLACE-ME-writer-token"
subject = "svc:writer"
groups = ["writers"]

[[auth.tokens]]
token = "REPLACE-ME-reader-token"
subject = "svc:reader"
groups = ["readers"]

[authority]
mode = "static"

# [authority]
# mode = "kubernetes"
#
# [authority.kubernetes]
# in_cluster = true
# connect_timeout_ms = 500
# request_timeout_ms = 2000
# max_attempts = 3
# retry_backoff_ms = 100

[gate]
call_timeout_ms = 5000

[gate.cache]
enabled = true
allow_ttl_ms = 5000
deny_ttl_ms = 1000
max_entries = 10000

[[rbac.roles]]
name = "results-writer"

[[rbac.roles.rules]]
resources = ["results", "records"]
verbs = ["*"]

[[rbac.roles]]
name = "results-reader"

[[rbac.roles.rules]]
resources = ["results", "records"]
verbs = ["get", "list", "watch"]

[[rbac.bindings]]
role = "results-writer"
namespace = "default"
groups = ["writers"]

[[rbac.bindings]]
role = "results-reader"
groups = ["readers"]
"#,
    )
}
