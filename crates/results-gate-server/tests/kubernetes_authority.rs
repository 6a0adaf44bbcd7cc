// crates/results-gate-server/tests/kubernetes_authority.rs
// ============================================================================
// Module: Kubernetes Authority Tests
// Description: SubjectAccessReview client against a stub API server.
// Purpose: Validate request shape, decisions, retries, and failure mapping.
// Dependencies: results-gate-server, base64, tiny_http, tempfile, toml
// ============================================================================

//! ## Overview
//! A `tiny_http` stub plays the API server. Tests assert on the review body
//! the client sends and on how each response class is classified.
//!
//! ## Security Posture
//! Any response that is not a well-formed review must surface as
//! [`AuthorityError`], never as an allow.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use results_gate_config::KubernetesAuthorityConfig;
use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::CredentialKind;
use results_gate_core::ResourceType;
use results_gate_core::Verb;
use results_gate_server::AuthorityError;
use results_gate_server::CallMetadata;
use results_gate_server::KubernetesAuthority;
use results_gate_server::RbacAuthority;
use results_gate_server::authority::SUBJECT_ACCESS_REVIEW_PATH;
use results_gate_server::identity::BearerClaimsExtractor;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Stub API Server
// ============================================================================

/// Request observed by the stub.
#[derive(Debug, Clone)]
struct Observed {
    /// Request path.
    path: String,
    /// Authorization header, if any.
    authorization: Option<String>,
    /// Parsed JSON body.
    body: Value,
}

/// Requests recorded by the stub, in arrival order.
type Observations = Arc<Mutex<Vec<Observed>>>;

/// Serves `responses` in order, one per request, and records each request.
fn stub(responses: Vec<(u16, String)>) -> (String, Observations, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let handle = thread::spawn(move || {
        for (status, body) in responses {
            let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(5)) else {
                return;
            };
            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            sink.lock().unwrap().push(Observed {
                path: request.url().to_string(),
                authorization,
                body: serde_json::from_str(&raw).unwrap_or(Value::Null),
            });
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(body).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}"), observed, handle)
}

fn config(extra: &str) -> KubernetesAuthorityConfig {
    let base = "api_server = \"http://127.0.0.1:1\"\nallow_http = true\nretry_backoff_ms = 10\n";
    toml::from_str(&format!("{base}{extra}")).unwrap()
}

fn identity() -> CallIdentity {
    CallIdentity::new("system:serviceaccount:ci:builder", CredentialKind::BearerClaims)
        .unwrap()
        .with_groups(["system:serviceaccounts", "system:authenticated"])
}

fn get_record() -> AuthorizationTuple {
    AuthorizationTuple::new("ci", ResourceType::Record, Verb::Get).with_resource_name("log-0")
}

fn review(allowed: bool, reason: &str) -> String {
    json!({
        "apiVersion": "authorization.k8s.io/v1",
        "kind": "SubjectAccessReview",
        "status": {"allowed": allowed, "reason": reason}
    })
    .to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn allow_review_carries_subject_and_resource_attributes() {
    let (url, observed, handle) = stub(vec![(201, review(true, "rbac: bound"))]);
    let authority =
        KubernetesAuthority::new(&url, Some("gate-token".to_string()), &config("")).unwrap();
    let decision = authority.authorize(&identity(), &get_record()).await.unwrap();
    handle.join().unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some("rbac: bound"));
    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    let request = &observed[0];
    assert_eq!(request.path, SUBJECT_ACCESS_REVIEW_PATH);
    assert_eq!(request.authorization.as_deref(), Some("Bearer gate-token"));
    let spec = &request.body["spec"];
    assert_eq!(spec["user"], "system:serviceaccount:ci:builder");
    assert_eq!(spec["groups"], json!(["system:authenticated", "system:serviceaccounts"]));
    let attributes = &spec["resourceAttributes"];
    assert_eq!(attributes["namespace"], "ci");
    assert_eq!(attributes["verb"], "get");
    assert_eq!(attributes["group"], "results.tekton.dev");
    assert_eq!(attributes["resource"], "records");
    assert_eq!(attributes["name"], "log-0");
    assert!(spec.get("extra").is_none());
}

#[tokio::test]
async fn review_forwards_extra_attributes_from_bearer_claims() {
    let claims = json!({
        "sub": "alice",
        "groups": ["devs"],
        "email": "alice@example.com",
        "scopes": ["results.read", "results.write"]
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let token = format!("e30.{payload}.c2ln");
    let caller = BearerClaimsExtractor::new(0)
        .extract_at(&CallMetadata::new().with_bearer(&token), 1_800_000_000)
        .unwrap();

    let (url, observed, handle) = stub(vec![(201, review(true, ""))]);
    let authority = KubernetesAuthority::new(&url, None, &config("")).unwrap();
    assert!(authority.authorize(&caller, &get_record()).await.unwrap().allowed);
    handle.join().unwrap();
    let observed = observed.lock().unwrap();
    let spec = &observed[0].body["spec"];
    assert_eq!(spec["user"], "alice");
    assert_eq!(
        spec["extra"],
        json!({
            "email": ["alice@example.com"],
            "scopes": ["results.read", "results.write"]
        })
    );
}

#[tokio::test]
async fn deny_review_is_a_decision_not_an_error() {
    let (url, _observed, handle) = stub(vec![(201, review(false, "no binding"))]);
    let authority = KubernetesAuthority::new(&url, None, &config("")).unwrap();
    let decision = authority.authorize(&identity(), &get_record()).await.unwrap();
    handle.join().unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some("no binding"));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let (url, observed, handle) = stub(vec![
        (503, "{}".to_string()),
        (500, "{}".to_string()),
        (201, review(true, "")),
    ]);
    let authority = KubernetesAuthority::new(&url, None, &config("max_attempts = 3")).unwrap();
    let decision = authority.authorize(&identity(), &get_record()).await.unwrap();
    handle.join().unwrap();
    assert!(decision.allowed);
    assert_eq!(observed.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_are_unavailable() {
    let (url, observed, handle) =
        stub(vec![(500, "{}".to_string()), (500, "{}".to_string())]);
    let authority = KubernetesAuthority::new(&url, None, &config("max_attempts = 2")).unwrap();
    let err = authority.authorize(&identity(), &get_record()).await.unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, AuthorityError::Unavailable(_)), "{err}");
    assert_eq!(observed.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_gate_credentials_are_not_retried() {
    let (url, observed, handle) = stub(vec![(403, "{}".to_string())]);
    let authority = KubernetesAuthority::new(&url, None, &config("max_attempts = 3")).unwrap();
    let err = authority.authorize(&identity(), &get_record()).await.unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err, AuthorityError::Unavailable(_)));
    assert_eq!(observed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_review_is_unavailable() {
    let (url, _observed, handle) =
        stub(vec![(201, "not json".to_string()), (201, "{\"kind\":\"x\"}".to_string())]);
    let authority = KubernetesAuthority::new(&url, None, &config("max_attempts = 1")).unwrap();
    let first = authority.authorize(&identity(), &get_record()).await.unwrap_err();
    let second = authority.authorize(&identity(), &get_record()).await.unwrap_err();
    handle.join().unwrap();
    assert!(matches!(first, AuthorityError::Unavailable(_)));
    assert!(matches!(second, AuthorityError::Unavailable(_)));
}

#[tokio::test]
async fn unreachable_api_server_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let authority = KubernetesAuthority::new(&url, None, &config("max_attempts = 2")).unwrap();
    let err = authority.authorize(&identity(), &get_record()).await.unwrap_err();
    assert!(matches!(err, AuthorityError::Unavailable(_)));
}

#[tokio::test]
async fn token_file_is_read_per_review() {
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(token_file, "first-token").unwrap();
    let (url, observed, handle) = stub(vec![(201, review(true, "")), (201, review(true, ""))]);
    let path = token_file.path().display().to_string().replace('\\', "/");
    let config: KubernetesAuthorityConfig = toml::from_str(&format!(
        "api_server = \"{url}\"\nallow_http = true\ntoken_path = \"{path}\"\n"
    ))
    .unwrap();
    let authority = KubernetesAuthority::from_config(&config).unwrap();
    authority.authorize(&identity(), &get_record()).await.unwrap();
    std::fs::write(token_file.path(), "rotated-token\n").unwrap();
    authority.authorize(&identity(), &get_record()).await.unwrap();
    handle.join().unwrap();

    let observed = observed.lock().unwrap();
    assert_eq!(observed[0].authorization.as_deref(), Some("Bearer first-token"));
    assert_eq!(observed[1].authorization.as_deref(), Some("Bearer rotated-token"));
}
