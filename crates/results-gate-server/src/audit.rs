// crates/results-gate-server/src/audit.rs
// ============================================================================
// Module: Gate Audit Logging
// Description: Structured audit events for authorization decisions.
// Purpose: Record every terminal gate decision as a JSON line.
// Dependencies: results-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every call that reaches the gate produces exactly one
//! [`GateAuditEvent`]. Events carry the credential fingerprint, never the
//! credential. Sinks write JSON lines to stderr or an append-only file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use results_gate_core::AuthorizationTuple;
use serde::Serialize;

use crate::gate::GateState;
use crate::telemetry::GateOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authorization decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Method as presented by the caller.
    pub method: String,
    /// Terminal gate state.
    pub state: GateState,
    /// Outcome classification.
    pub outcome: GateOutcome,
    /// Authenticated subject, when extraction succeeded.
    pub subject: Option<String>,
    /// Credential kind label, when extraction succeeded.
    pub credential: Option<&'static str>,
    /// Credential fingerprint, when available.
    pub fingerprint: Option<String>,
    /// Authorization tuple, when mapping succeeded.
    pub tuple: Option<AuthorizationTuple>,
    /// Whether the decision came from the cache.
    pub cache_hit: bool,
    /// Gate latency in milliseconds.
    pub latency_ms: u128,
    /// Public reason returned to the caller.
    pub reason: String,
    /// Internal detail; never returned to the caller.
    pub detail: Option<String>,
}

/// Inputs required to construct a gate audit event.
pub struct GateAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Method as presented by the caller.
    pub method: String,
    /// Terminal gate state.
    pub state: GateState,
    /// Outcome classification.
    pub outcome: GateOutcome,
    /// Authenticated subject, when extraction succeeded.
    pub subject: Option<String>,
    /// Credential kind label, when extraction succeeded.
    pub credential: Option<&'static str>,
    /// Credential fingerprint, when available.
    pub fingerprint: Option<String>,
    /// Authorization tuple, when mapping succeeded.
    pub tuple: Option<AuthorizationTuple>,
    /// Whether the decision came from the cache.
    pub cache_hit: bool,
    /// Gate latency in milliseconds.
    pub latency_ms: u128,
    /// Public reason returned to the caller.
    pub reason: String,
    /// Internal detail.
    pub detail: Option<String>,
}

/// Security posture audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: String,
    /// Optional message.
    pub message: Option<String>,
    /// Identity extraction mode label.
    pub auth_mode: String,
    /// Authority mode label.
    pub authority_mode: String,
    /// Whether the listener terminates TLS.
    pub tls_enabled: bool,
}

/// Inputs required to construct a security audit event.
pub struct SecurityAuditEventParams {
    /// Security event kind.
    pub kind: String,
    /// Optional message.
    pub message: Option<String>,
    /// Identity extraction mode label.
    pub auth_mode: String,
    /// Authority mode label.
    pub authority_mode: String,
    /// Whether the listener terminates TLS.
    pub tls_enabled: bool,
}

impl GateAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GateAuditEventParams) -> Self {
        Self {
            event: "results_call_authz",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            peer_ip: params.peer_ip,
            method: params.method,
            state: params.state,
            outcome: params.outcome,
            subject: params.subject,
            credential: params.credential,
            fingerprint: params.fingerprint,
            tuple: params.tuple,
            cache_hit: params.cache_hit,
            latency_ms: params.latency_ms,
            reason: params.reason,
            detail: params.detail,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a new security audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SecurityAuditEventParams) -> Self {
        Self {
            event: "security_audit",
            timestamp_ms: now_ms(),
            kind: params.kind,
            message: params.message,
            auth_mode: params.auth_mode,
            authority_mode: params.authority_mode,
            tls_enabled: params.tls_enabled,
        }
    }
}

/// Returns the current time in milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gate events.
pub trait GateAuditSink: Send + Sync {
    /// Record a decision audit event.
    fn record(&self, event: &GateAuditEvent);

    /// Record a security posture audit event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        self.write_line(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.write_line(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}

    fn record_security(&self, _event: &SecurityAuditEvent) {}
}
