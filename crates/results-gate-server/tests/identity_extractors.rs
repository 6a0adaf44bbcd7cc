// crates/results-gate-server/tests/identity_extractors.rs
// ============================================================================
// Module: Identity Extractor Tests
// Description: Bearer claims, static token, and mTLS subject extraction.
// Purpose: Validate identity derivation and fail-closed credential handling.
// Dependencies: results-gate-server, base64, toml
// ============================================================================

//! Identity extractor tests across all configured modes.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use results_gate_config::AuthMode;
use results_gate_config::ResultsGateConfig;
use results_gate_config::StaticTokenConfig;
use results_gate_core::CredentialKind;
use results_gate_server::AuthenticationError;
use results_gate_server::CallMetadata;
use results_gate_server::IdentityExtractor;
use results_gate_server::identity::BearerClaimsExtractor;
use results_gate_server::identity::MtlsSubjectExtractor;
use results_gate_server::identity::StaticTokenExtractor;
use results_gate_server::identity::extractor_from_config;
use results_gate_server::identity::fingerprint;
use serde_json::json;

/// Fixed clock for expiry checks.
const NOW: u64 = 1_800_000_000;

fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

fn bearer(token: &str) -> CallMetadata {
    CallMetadata::new().with_bearer(token)
}

// ============================================================================
// SECTION: Bearer Claims
// ============================================================================

#[test]
fn bearer_claims_yield_subject_groups_and_expiry() {
    let token = jwt(&json!({
        "sub": "system:serviceaccount:ci:builder",
        "groups": ["builders"],
        "exp": NOW + 600
    }));
    let identity = BearerClaimsExtractor::new(0).extract_at(&bearer(&token), NOW).unwrap();
    assert_eq!(identity.subject(), "system:serviceaccount:ci:builder");
    assert_eq!(identity.credential(), CredentialKind::BearerClaims);
    assert!(identity.in_group("builders"));
    assert!(identity.in_group("system:serviceaccounts:ci"));
    assert!(identity.in_group("system:authenticated"));
    assert_eq!(identity.expires_at(), Some(NOW + 600));
    assert_eq!(identity.fingerprint(), Some(fingerprint(&token).as_str()));
}

#[test]
fn bearer_claims_honor_expiry_leeway() {
    let token = jwt(&json!({"sub": "alice", "exp": NOW - 30}));
    let strict = BearerClaimsExtractor::new(0).extract_at(&bearer(&token), NOW);
    assert_eq!(strict.unwrap_err(), AuthenticationError::Expired);
    let lenient = BearerClaimsExtractor::new(60).extract_at(&bearer(&token), NOW);
    assert_eq!(lenient.unwrap().subject(), "alice");
}

#[test]
fn bearer_claims_reject_tokens_before_not_before() {
    let token = jwt(&json!({"sub": "alice", "nbf": NOW + 30, "exp": NOW + 600}));
    let strict = BearerClaimsExtractor::new(0).extract_at(&bearer(&token), NOW);
    assert_eq!(
        strict.unwrap_err(),
        AuthenticationError::NotYetValid {
            not_before: NOW + 30
        }
    );
    let lenient = BearerClaimsExtractor::new(30).extract_at(&bearer(&token), NOW);
    assert_eq!(lenient.unwrap().subject(), "alice");
    let later = BearerClaimsExtractor::new(0).extract_at(&bearer(&token), NOW + 30);
    assert!(later.is_ok());
}

#[test]
fn bearer_claims_forward_unregistered_string_claims_as_extra() {
    let token = jwt(&json!({
        "sub": "alice",
        "groups": ["devs"],
        "iss": "https://issuer.example",
        "aud": ["results"],
        "iat": NOW,
        "email": "alice@example.com",
        "scopes": ["results.read", "results.write"],
        "tenant": {"id": 7},
        "mixed": ["ok", 1],
        "admin": true
    }));
    let identity = BearerClaimsExtractor::new(0).extract_at(&bearer(&token), NOW).unwrap();
    let extra = identity.extra();
    assert_eq!(extra.keys().map(String::as_str).collect::<Vec<_>>(), ["email", "scopes"]);
    assert_eq!(extra["email"], vec!["alice@example.com".to_string()]);
    assert_eq!(extra["scopes"], vec!["results.read".to_string(), "results.write".to_string()]);
    assert!(!extra.contains_key("groups"));

    let other = jwt(&json!({"sub": "alice", "groups": ["devs"], "email": "a@other.example"}));
    let other = BearerClaimsExtractor::new(0).extract_at(&bearer(&other), NOW).unwrap();
    assert_ne!(identity.key(), other.key());
}

#[test]
fn bearer_claims_reject_malformed_tokens() {
    let extractor = BearerClaimsExtractor::new(0);
    for token in [
        "opaque-token".to_string(),
        "a.!!!.c".to_string(),
        format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]")),
        jwt(&json!({"groups": ["no-subject"]})),
        jwt(&json!({"sub": "   "})),
    ] {
        let err = extractor.extract_at(&bearer(&token), NOW).unwrap_err();
        assert!(matches!(err, AuthenticationError::Malformed(_)), "{token}: {err}");
    }
    let err = extractor.extract_at(&CallMetadata::new(), NOW).unwrap_err();
    assert!(matches!(err, AuthenticationError::Missing(_)));
}

// ============================================================================
// SECTION: Static Tokens
// ============================================================================

#[test]
fn static_tokens_expire_with_leeway() {
    let tokens = vec![StaticTokenConfig {
        token: "short-lived".to_string(),
        subject: "svc:batch".to_string(),
        groups: vec!["batch".to_string()],
        expires_at: Some(NOW),
    }];
    let extractor = StaticTokenExtractor::new(&tokens, 10);
    let identity = extractor.extract_at(&bearer("short-lived"), NOW + 10).unwrap();
    assert_eq!(identity.expires_at(), Some(NOW));
    assert!(identity.in_group("batch"));
    let err = extractor.extract_at(&bearer("short-lived"), NOW + 11).unwrap_err();
    assert_eq!(err, AuthenticationError::Expired);
    let err = extractor.extract_at(&bearer("other"), NOW).unwrap_err();
    assert!(matches!(err, AuthenticationError::Rejected(_)));
}

// ============================================================================
// SECTION: Configured Modes
// ============================================================================

fn auth_config(toml_str: &str) -> ResultsGateConfig {
    toml::from_str(toml_str).unwrap()
}

#[test]
fn configured_mode_selects_extractor() {
    let bearer_mode = auth_config("[auth]\nmode = \"bearer_claims\"\n");
    assert_eq!(extractor_from_config(&bearer_mode.auth).mode(), AuthMode::BearerClaims);

    let static_mode = auth_config(
        "[auth]\nmode = \"static_tokens\"\n[[auth.tokens]]\ntoken = \"t\"\nsubject = \"svc:t\"\n",
    );
    let extractor = extractor_from_config(&static_mode.auth);
    assert_eq!(extractor.mode(), AuthMode::StaticTokens);
    assert_eq!(extractor.extract(&bearer("t")).unwrap().subject(), "svc:t");
}

#[test]
fn mtls_subjects_are_allowlisted_and_mapped_to_groups() {
    let config = auth_config(
        r#"
[auth]
mode = "mtls_subject"
mtls_subjects = ["CN=watcher", "CN=ui"]

[[auth.principals]]
subject = "CN=watcher"
groups = ["tekton-watchers"]
"#,
    );
    let extractor = extractor_from_config(&config.auth);
    assert_eq!(extractor.mode(), AuthMode::MtlsSubject);

    let watcher = extractor
        .extract(&CallMetadata::new().with_client_subject(" CN=watcher "))
        .unwrap();
    assert_eq!(watcher.subject(), "CN=watcher");
    assert_eq!(watcher.credential(), CredentialKind::MtlsSubject);
    assert!(watcher.in_group("tekton-watchers"));

    let ui = extractor.extract(&CallMetadata::new().with_client_subject("CN=ui")).unwrap();
    assert!(ui.groups().is_empty());

    let err = extractor
        .extract(&CallMetadata::new().with_client_subject("CN=intruder"))
        .unwrap_err();
    assert!(matches!(err, AuthenticationError::Rejected(_)));
    let err = extractor.extract(&bearer("ignored")).unwrap_err();
    assert!(matches!(err, AuthenticationError::Missing(_)));
}

#[test]
fn mtls_empty_allowlist_rejects_every_subject() {
    let extractor = MtlsSubjectExtractor::new(&[], &[]);
    for subject in ["system:admin", "CN=watcher"] {
        let err = extractor
            .extract(&CallMetadata::new().with_client_subject(subject))
            .unwrap_err();
        assert!(matches!(err, AuthenticationError::Rejected(_)), "{subject}: {err}");
    }
}
