// crates/results-gate-server/src/server.rs
// ============================================================================
// Module: Results Gate Server
// Description: Composition root and HTTP JSON-RPC transport.
// Purpose: Wire configuration into a gated results service and serve it.
// Dependencies: axum, axum-server, rustls, results-gate-config, tokio
// ============================================================================

//! ## Overview
//! [`ResultsGateServer::from_config`] builds every dependency explicitly:
//! extractor, method registry, authority, decision cache, audit sink, and
//! handler. Startup fails when any method the service dispatches lacks a
//! mapping rule in the registry.
//! Requests arrive as JSON-RPC over `POST /rpc`; the method name is the
//! results RPC name and `params` is the request message. `GET /stats` serves
//! in-process decision counters and the latency histogram.
//!
//! Security posture: request bodies are untrusted and size-limited. Posture
//! warnings are emitted as security audit events at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum_server::tls_rustls::RustlsConfig;
use results_gate_config::AuthMode;
use results_gate_config::AuthorityMode;
use results_gate_config::PLACEHOLDER_TOKEN_PREFIX;
use results_gate_config::ResultsGateConfig;
use results_gate_core::InMemoryResults;
use results_gate_core::ResultsHandler;
use results_gate_core::ResultsMethod;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::audit::FileAuditSink;
use crate::audit::GateAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::SecurityAuditEvent;
use crate::audit::SecurityAuditEventParams;
use crate::audit::StderrAuditSink;
use crate::authority::authority_from_config;
use crate::cache::CachePolicy;
use crate::cache::DecisionCache;
use crate::gate::AuthorizationGate;
use crate::identity::CLIENT_SUBJECT_HEADER;
use crate::identity::CallMetadata;
use crate::identity::extractor_from_config;
use crate::mapper::MethodRegistry;
use crate::mapper::MethodRule;
use crate::service::ProtectedService;
use crate::service::ServiceError;
use crate::telemetry::DecisionStats;
use crate::telemetry::DecisionStatsSnapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying a caller-supplied request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Body returned by the health endpoint.
pub const HEALTH_SERVING: &str = "SERVING";
/// Maximum accepted request identifier length.
const MAX_REQUEST_ID_BYTES: usize = 128;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Gated results server.
pub struct ResultsGateServer {
    /// Validated configuration.
    config: ResultsGateConfig,
    /// Gated service.
    service: ProtectedService,
    /// Decision counters fed by the gate.
    stats: Arc<DecisionStats>,
}

impl ResultsGateServer {
    /// Builds a server backed by the in-memory results handler.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration or initialization fails.
    pub fn from_config(config: ResultsGateConfig) -> Result<Self, ServerError> {
        Self::with_handler(config, Arc::new(InMemoryResults::new()))
    }

    /// Builds a server around an explicit handler.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration or initialization fails.
    pub fn with_handler(
        config: ResultsGateConfig,
        handler: Arc<dyn ResultsHandler>,
    ) -> Result<Self, ServerError> {
        Self::with_registry(config, handler, MethodRegistry::results_defaults())
    }

    /// Builds a server around an explicit handler and method registry.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Init`] when the registry lacks a rule for a
    /// served method, or another [`ServerError`] when initialization fails.
    pub fn with_registry(
        config: ResultsGateConfig,
        handler: Arc<dyn ResultsHandler>,
        registry: MethodRegistry,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config)?;
        let stats = Arc::new(DecisionStats::new());
        let metrics: Arc<DecisionStats> = Arc::clone(&stats);
        let gate = build_gate(&config, registry, Arc::clone(&audit))?.with_metrics(metrics);
        emit_posture_warnings(&config, audit.as_ref());
        Ok(Self {
            config,
            service: ProtectedService::new(Arc::new(gate), handler),
            stats,
        })
    }

    /// Returns the gated service.
    #[must_use]
    pub const fn service(&self) -> &ProtectedService {
        &self.service
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ResultsGateConfig {
        &self.config
    }

    /// Builds the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            service: self.service.clone(),
            stats: Arc::clone(&self.stats),
        });
        Router::new()
            .route("/rpc", post(handle_rpc))
            .route("/healthz", get(handle_health))
            .route("/methods", get(handle_methods))
            .route("/stats", get(handle_stats))
            .layer(DefaultBodyLimit::max(self.config.server.max_body_bytes))
            .with_state(state)
    }

    /// Serves on the configured bind address, with TLS when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let Some(tls) = self.config.server.tls.clone() else {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
            return self.serve_on(listener).await;
        };
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|err| ServerError::Init(format!("tls config failed: {err}")))?;
        let app = self.router();
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Transport(format!("https server failed: {err}")))
    }

    /// Serves plain HTTP on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Composition
// ============================================================================

/// Builds the authorization gate from configuration.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the registry does not cover every
/// served method or the authority cannot be built.
pub fn build_gate(
    config: &ResultsGateConfig,
    registry: MethodRegistry,
    audit: Arc<dyn GateAuditSink>,
) -> Result<AuthorizationGate, ServerError> {
    let served = ProtectedService::SERVED_METHODS.iter().copied().map(ResultsMethod::short_name);
    registry.ensure_covers(served).map_err(|err| ServerError::Init(err.to_string()))?;
    let extractor = Arc::from(extractor_from_config(&config.auth));
    let authority =
        Arc::from(authority_from_config(config).map_err(|err| ServerError::Init(err.to_string()))?);
    let gate = AuthorizationGate::new(
        extractor,
        Arc::new(registry),
        authority,
        Duration::from_millis(config.gate.call_timeout_ms),
    )
    .with_audit(audit);
    if config.gate.cache.enabled {
        let cache = DecisionCache::new(CachePolicy::from(&config.gate.cache));
        return Ok(gate.with_cache(Arc::new(cache)));
    }
    Ok(gate)
}

/// Builds the configured audit sink.
fn build_audit_sink(config: &ResultsGateConfig) -> Result<Arc<dyn GateAuditSink>, ServerError> {
    let audit = &config.server.audit;
    if !audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &audit.path {
        Some(path) => FileAuditSink::new(Path::new(path))
            .map(|sink| Arc::new(sink) as Arc<dyn GateAuditSink>)
            .map_err(|err| ServerError::Init(format!("audit log {path}: {err}"))),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Records startup warnings for weak security postures.
fn emit_posture_warnings(config: &ResultsGateConfig, audit: &dyn GateAuditSink) {
    let tls_enabled = config.server.tls.is_some();
    let warn = |kind: &str, message: &str| {
        audit.record_security(&SecurityAuditEvent::new(SecurityAuditEventParams {
            kind: kind.to_string(),
            message: Some(message.to_string()),
            auth_mode: config.auth.mode.as_str().to_string(),
            authority_mode: config.authority.mode.as_str().to_string(),
            tls_enabled,
        }));
    };
    if config.auth.mode == AuthMode::BearerClaims {
        warn(
            "unverified_bearer_claims",
            "bearer signatures are not verified; deploy behind a verifying proxy",
        );
    }
    if config.auth.mode == AuthMode::StaticTokens
        && config.auth.tokens.iter().any(|entry| entry.token.starts_with(PLACEHOLDER_TOKEN_PREFIX))
    {
        warn("placeholder_static_token", "example placeholder tokens are still configured");
    }
    if config.auth.mode == AuthMode::MtlsSubject && !tls_enabled {
        warn("mtls_subject_without_tls", "client subjects are trusted from a proxy header");
    }
    if !tls_enabled && !bind_is_loopback(&config.server.bind) {
        warn("plaintext_listener", "non-loopback listener without tls");
    }
    if config.authority.mode == AuthorityMode::Static && config.rbac.is_empty() {
        warn("empty_static_rbac", "no rbac bindings configured; every call will be denied");
    }
    if !config.gate.cache.enabled {
        warn("decision_cache_disabled", "every call performs an authority round trip");
    }
}

/// Returns true when the bind address is loopback.
fn bind_is_loopback(bind: &str) -> bool {
    bind.trim().parse::<SocketAddr>().is_ok_and(|addr| addr.ip().is_loopback())
}

// ============================================================================
// SECTION: HTTP Handlers
// ============================================================================

/// Shared server state for HTTP handlers.
struct ServerState {
    /// Gated service.
    service: ProtectedService,
    /// Decision counters.
    stats: Arc<DecisionStats>,
}

/// Handles JSON-RPC results calls.
async fn handle_rpc(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let metadata = http_call_metadata(peer, &headers);
    let parsed =
        body.map_err(|rejection| body_error(&rejection)).and_then(|bytes| parse_request(&bytes));
    let (status, response) = match parsed {
        Ok(request) => dispatch(&state.service, &metadata, request).await,
        Err(rejected) => rejected,
    };
    (status, Json(response))
}

/// Handles health probes.
async fn handle_health() -> &'static str {
    HEALTH_SERVING
}

/// Reports decision counters and the latency histogram.
async fn handle_stats(State(state): State<Arc<ServerState>>) -> Json<DecisionStatsSnapshot> {
    Json(state.stats.snapshot())
}

/// Lists the registered authorization rules.
async fn handle_methods(State(state): State<Arc<ServerState>>) -> Json<Vec<MethodRule>> {
    Json(state.service.gate().registry().rules().cloned().collect())
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    id: Value,
    /// Results method name.
    method: String,
    /// Optional request message.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Maps a body extraction failure to a JSON-RPC error envelope.
///
/// The router's body limit surfaces here as a length-limit rejection.
fn body_error(rejection: &BytesRejection) -> (StatusCode, JsonRpcResponse) {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            Value::Null,
            -32070,
            "request body too large",
        );
    }
    error_response(StatusCode::BAD_REQUEST, Value::Null, -32600, "invalid json-rpc request")
}

/// Parses and validates a JSON-RPC request payload.
fn parse_request(bytes: &Bytes) -> Result<JsonRpcRequest, (StatusCode, JsonRpcResponse)> {
    let invalid = || {
        error_response(StatusCode::BAD_REQUEST, Value::Null, -32600, "invalid json-rpc request")
    };
    let request: JsonRpcRequest = serde_json::from_slice(bytes.as_ref()).map_err(|_| invalid())?;
    if request.jsonrpc != "2.0" {
        return Err(invalid());
    }
    Ok(request)
}

/// Runs a parsed request through the gated service.
async fn dispatch(
    service: &ProtectedService,
    metadata: &CallMetadata,
    request: JsonRpcRequest,
) -> (StatusCode, JsonRpcResponse) {
    let params = request.params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    match service.call(metadata, &request.method, params).await {
        Ok(result) => (
            StatusCode::OK,
            JsonRpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(result),
                error: None,
            },
        ),
        Err(err) => jsonrpc_error(request.id, &err),
    }
}

/// Builds a JSON-RPC error response for a service failure.
fn jsonrpc_error(id: Value, error: &ServiceError) -> (StatusCode, JsonRpcResponse) {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, id, error.jsonrpc_code(), &error.public_message())
}

/// Builds a JSON-RPC error envelope.
fn error_response(
    status: StatusCode,
    id: Value,
    code: i64,
    message: &str,
) -> (StatusCode, JsonRpcResponse) {
    (
        status,
        JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
        },
    )
}

/// Extracts call metadata from HTTP headers.
fn http_call_metadata(peer: SocketAddr, headers: &HeaderMap) -> CallMetadata {
    let header = |name: &str| {
        headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
    };
    let mut metadata = CallMetadata::new().with_peer_ip(peer.ip());
    metadata.auth_header = header(AUTHORIZATION.as_str());
    metadata.client_subject = header(CLIENT_SUBJECT_HEADER);
    metadata.request_id = header(REQUEST_ID_HEADER).filter(|id| {
        !id.is_empty()
            && id.len() <= MAX_REQUEST_ID_BYTES
            && id.bytes().all(|byte| byte.is_ascii_graphic())
    });
    metadata
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use std::net::SocketAddr;

    use axum::http::HeaderMap;
    use axum::http::HeaderValue;

    use super::REQUEST_ID_HEADER;
    use super::bind_is_loopback;
    use super::http_call_metadata;

    #[test]
    fn loopback_detection() {
        assert!(bind_is_loopback("127.0.0.1:50051"));
        assert!(bind_is_loopback("[::1]:50051"));
        assert!(!bind_is_loopback("0.0.0.0:50051"));
        assert!(!bind_is_loopback("not an address"));
    }

    #[test]
    fn metadata_reads_headers_and_drops_bad_request_ids() {
        let peer: SocketAddr = "10.0.0.7:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));
        let metadata = http_call_metadata(peer, &headers);
        assert_eq!(metadata.auth_header.as_deref(), Some("Bearer abc"));
        assert_eq!(metadata.request_id.as_deref(), Some("req-1"));
        assert_eq!(metadata.peer_ip, Some(peer.ip()));

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("has space"));
        assert!(http_call_metadata(peer, &headers).request_id.is_none());
    }
}
