// crates/results-gate-config/tests/validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Cross-field and limit validation for results-gate.toml.
// Purpose: Ensure misconfiguration is rejected before the gate starts.
// =============================================================================

//! Validation tests for results-gate-config.

use results_gate_config::AuthMode;
use results_gate_config::AuthorityMode;
use results_gate_config::KubernetesAuthorityConfig;
use results_gate_config::RoleBindingConfig;
use results_gate_config::RoleConfig;
use results_gate_config::RuleConfig;
use results_gate_config::ServerTlsConfig;
use results_gate_config::StaticTokenConfig;

mod common;

use common::TestResult;
use common::assert_invalid;

fn kubernetes(api_server: Option<&str>) -> KubernetesAuthorityConfig {
    KubernetesAuthorityConfig {
        api_server: api_server.map(ToString::to_string),
        in_cluster: false,
        token: None,
        token_path: None,
        ca_path: None,
        allow_http: false,
        connect_timeout_ms: 500,
        request_timeout_ms: 2000,
        max_attempts: 3,
        retry_backoff_ms: 100,
    }
}

fn token(token: &str, subject: &str) -> StaticTokenConfig {
    StaticTokenConfig {
        token: token.to_string(),
        subject: subject.to_string(),
        groups: Vec::new(),
        expires_at: None,
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost".to_string();
    assert_invalid(config.validate(), "invalid bind address")
}

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes")
}

#[test]
fn empty_tls_path_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.tls = Some(ServerTlsConfig {
        cert_path: "  ".to_string(),
        key_path: "tls.key".to_string(),
    });
    assert_invalid(config.validate(), "tls.cert_path")
}

// ============================================================================
// SECTION: Identity
// ============================================================================

#[test]
fn static_tokens_mode_requires_tokens() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.mode = AuthMode::StaticTokens;
    assert_invalid(config.validate(), "requires auth.tokens")
}

#[test]
fn mtls_subject_mode_requires_subject_allowlist() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.mode = AuthMode::MtlsSubject;
    assert_invalid(config.validate(), "requires auth.mtls_subjects")?;
    config.auth.mtls_subjects = vec!["CN=watcher".to_string()];
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn duplicate_tokens_are_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.mode = AuthMode::StaticTokens;
    config.auth.tokens = vec![token("abc", "svc:a"), token("abc", "svc:b")];
    assert_invalid(config.validate(), "duplicate auth token")
}

#[test]
fn token_with_whitespace_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.tokens = vec![token("ab c", "svc:a")];
    assert_invalid(config.validate(), "whitespace")
}

#[test]
fn token_without_subject_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.auth.tokens = vec![token("abc", " ")];
    assert_invalid(config.validate(), "auth.tokens.subject")
}

// ============================================================================
// SECTION: Authority
// ============================================================================

#[test]
fn kubernetes_mode_requires_section() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    assert_invalid(config.validate(), "requires authority.kubernetes")
}

#[test]
fn kubernetes_section_requires_static_mode_off() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.kubernetes = Some(kubernetes(Some("https://api.example.com")));
    assert_invalid(config.validate(), "only allowed when authority.mode=kubernetes")
}

#[test]
fn kubernetes_requires_endpoint_or_in_cluster() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    config.authority.kubernetes = Some(kubernetes(None));
    assert_invalid(config.validate(), "api_server or in_cluster")
}

#[test]
fn kubernetes_rejects_plain_http_without_opt_in() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    config.authority.kubernetes = Some(kubernetes(Some("http://127.0.0.1:8080")));
    assert_invalid(config.validate(), "allow_http")
}

#[test]
fn kubernetes_rejects_token_and_token_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    let mut section = kubernetes(Some("https://api.example.com"));
    section.token = Some("t".to_string());
    section.token_path = Some("/tmp/token".to_string());
    config.authority.kubernetes = Some(section);
    assert_invalid(config.validate(), "mutually exclusive")
}

#[test]
fn kubernetes_bounds_attempts_and_timeouts() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    let mut section = kubernetes(Some("https://api.example.com"));
    section.max_attempts = 0;
    config.authority.kubernetes = Some(section.clone());
    assert_invalid(config.validate(), "max_attempts")?;

    section.max_attempts = 3;
    section.request_timeout_ms = 5;
    config.authority.kubernetes = Some(section);
    assert_invalid(config.validate(), "request_timeout_ms")
}

#[test]
fn in_cluster_uses_standard_mounts() {
    let mut section = kubernetes(None);
    section.in_cluster = true;
    assert_eq!(
        section.resolved_token_path(),
        Some("/var/run/secrets/kubernetes.io/serviceaccount/token")
    );
    assert_eq!(
        section.resolved_ca_path(),
        Some("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
    );
    section.token = Some("inline".to_string());
    assert_eq!(section.resolved_token_path(), None);
}

#[test]
fn rbac_with_kubernetes_authority_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.authority.mode = AuthorityMode::Kubernetes;
    config.authority.kubernetes = Some(kubernetes(Some("https://api.example.com")));
    config.rbac.roles.push(RoleConfig {
        name: "r".to_string(),
        rules: Vec::new(),
    });
    assert_invalid(config.validate(), "only allowed when authority.mode=static")
}

// ============================================================================
// SECTION: Gate
// ============================================================================

#[test]
fn call_timeout_bounds_are_enforced() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.gate.call_timeout_ms = 0;
    assert_invalid(config.validate(), "gate.call_timeout_ms")
}

#[test]
fn cache_bounds_are_enforced() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.gate.cache.max_entries = 0;
    assert_invalid(config.validate(), "gate.cache.max_entries")?;
    config.gate.cache.max_entries = 10;
    config.gate.cache.allow_ttl_ms = 0;
    assert_invalid(config.validate(), "gate.cache.allow_ttl_ms")?;
    config.gate.cache.enabled = false;
    config.validate().map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: RBAC
// ============================================================================

#[test]
fn rbac_rejects_unknown_verbs_and_resources() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.rbac.roles.push(RoleConfig {
        name: "bad".to_string(),
        rules: vec![RuleConfig {
            resources: vec!["pods".to_string()],
            verbs: vec!["get".to_string()],
            resource_names: Vec::new(),
        }],
    });
    assert_invalid(config.validate(), "unknown rbac resource")?;

    config.rbac.roles[0].rules[0].resources = vec!["results".to_string()];
    config.rbac.roles[0].rules[0].verbs = vec!["patch".to_string()];
    assert_invalid(config.validate(), "unknown rbac verb")
}

#[test]
fn rbac_rejects_unknown_role_binding() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.rbac.bindings.push(RoleBindingConfig {
        role: "ghost".to_string(),
        namespace: None,
        users: vec!["svc:a".to_string()],
        groups: Vec::new(),
    });
    assert_invalid(config.validate(), "unknown role")
}

#[test]
fn rbac_rejects_invalid_binding_namespace() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.rbac.roles.push(RoleConfig {
        name: "r".to_string(),
        rules: Vec::new(),
    });
    config.rbac.bindings.push(RoleBindingConfig {
        role: "r".to_string(),
        namespace: Some("Not_Valid".to_string()),
        users: vec!["svc:a".to_string()],
        groups: Vec::new(),
    });
    assert_invalid(config.validate(), "namespace is invalid")
}

#[test]
fn rbac_rejects_duplicate_roles() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    for _ in 0..2 {
        config.rbac.roles.push(RoleConfig {
            name: "r".to_string(),
            rules: Vec::new(),
        });
    }
    assert_invalid(config.validate(), "duplicate rbac role")
}
