// crates/results-gate-server/src/gate.rs
// ============================================================================
// Module: Authorization Gate
// Description: Per-call authorization state machine.
// Purpose: Decide every call before any results handler runs.
// Dependencies: results-gate-core, serde, tokio
// ============================================================================

//! ## Overview
//! [`AuthorizationGate::authorize`] drives one call through
//! `Received -> IdentityExtracted -> TupleMapped -> DecisionPending` and ends
//! in exactly one of `Allowed`, `Denied`, or `Errored`. Only `Allowed` yields
//! an [`AuthorizedCall`]; every other terminal state yields a
//! [`GateRejection`] and the handler is never reached.
//!
//! ## Invariants
//! - Missing or invalid credentials end in `Errored` before mapping.
//! - Unmapped methods end in `Denied`.
//! - Authority failures and timeouts end in `Denied`, never `Allowed`.
//! - Only decisions are cached; failures always reach the authority again.
//! - Every call emits exactly one audit event.
//!
//! Security posture: rejection messages carry a fixed public reason; the
//! internal detail goes to the audit stream only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::Decision;
use results_gate_core::ResultsMethod;
use serde::Serialize;
use serde_json::Value;

use crate::audit::GateAuditEvent;
use crate::audit::GateAuditEventParams;
use crate::audit::GateAuditSink;
use crate::audit::NoopAuditSink;
use crate::authority::RbacAuthority;
use crate::cache::DecisionCache;
use crate::identity::CallMetadata;
use crate::identity::IdentityExtractor;
use crate::mapper::MappingError;
use crate::mapper::MethodRegistry;
use crate::telemetry::GateMetricEvent;
use crate::telemetry::GateMetrics;
use crate::telemetry::GateOutcome;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Public Reasons
// ============================================================================

/// Public reason for missing, malformed, or expired credentials.
pub const REASON_NOT_AUTHENTICATED: &str = "not authenticated";
/// Public reason for policy denials and unmapped methods.
pub const REASON_NOT_AUTHORIZED: &str = "not authorized";
/// Public reason for authority failures and timeouts.
pub const REASON_UNAVAILABLE: &str = "authorization service unavailable";
/// Public reason for payloads the mapper cannot scope.
pub const REASON_INVALID_REQUEST: &str = "invalid request";

// ============================================================================
// SECTION: States
// ============================================================================

/// Per-call gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Call accepted by the transport.
    Received,
    /// Caller identity established.
    IdentityExtracted,
    /// Authorization tuple derived.
    TupleMapped,
    /// Waiting on the cache or authority.
    DecisionPending,
    /// Call may proceed to the handler.
    Allowed,
    /// Call refused by policy or fail-closed handling.
    Denied,
    /// Call could not be evaluated.
    Errored,
}

impl GateState {
    /// Returns true for `Allowed`, `Denied`, and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Allowed | Self::Denied | Self::Errored)
    }

    /// Returns true when `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::IdentityExtracted | Self::Errored)
                | (Self::IdentityExtracted, Self::TupleMapped | Self::Denied | Self::Errored)
                | (Self::TupleMapped, Self::DecisionPending)
                | (Self::DecisionPending, Self::Allowed | Self::Denied)
        )
    }

    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::IdentityExtracted => "identity_extracted",
            Self::TupleMapped => "tuple_mapped",
            Self::DecisionPending => "decision_pending",
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Errored => "errored",
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Successful gate outcome handed to the protected handler.
#[derive(Debug, Clone)]
pub struct AuthorizedCall {
    /// Authenticated caller.
    pub identity: CallIdentity,
    /// Tuple the decision was made for.
    pub tuple: AuthorizationTuple,
    /// Resolved method.
    pub method: ResultsMethod,
    /// Authority decision.
    pub decision: Decision,
    /// Whether the decision came from the cache.
    pub cache_hit: bool,
}

/// Terminal non-`Allowed` gate outcome.
///
/// Display renders only the public reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRejection {
    /// Terminal state.
    pub state: GateState,
    /// Outcome classification.
    pub outcome: GateOutcome,
    /// Internal detail for audit.
    pub detail: String,
}

impl GateRejection {
    /// Returns the caller-visible reason.
    #[must_use]
    pub const fn public_reason(&self) -> &'static str {
        match self.outcome {
            GateOutcome::Unauthenticated => REASON_NOT_AUTHENTICATED,
            GateOutcome::InvalidRequest => REASON_INVALID_REQUEST,
            GateOutcome::Unavailable => REASON_UNAVAILABLE,
            GateOutcome::Denied | GateOutcome::Allowed => REASON_NOT_AUTHORIZED,
        }
    }

    /// Returns the JSON-RPC error code.
    #[must_use]
    pub const fn jsonrpc_code(&self) -> i64 {
        match self.outcome {
            GateOutcome::Unauthenticated => -32001,
            GateOutcome::InvalidRequest => -32602,
            GateOutcome::Unavailable => -32005,
            GateOutcome::Denied | GateOutcome::Allowed => -32003,
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.outcome {
            GateOutcome::Unauthenticated => 401,
            GateOutcome::InvalidRequest => 400,
            GateOutcome::Unavailable => 503,
            GateOutcome::Denied | GateOutcome::Allowed => 403,
        }
    }
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.public_reason())
    }
}

impl std::error::Error for GateRejection {}

// ============================================================================
// SECTION: Call Trace
// ============================================================================

/// Request-scoped gate bookkeeping.
struct CallTrace<'a> {
    /// Call metadata.
    metadata: &'a CallMetadata,
    /// Method as presented.
    method: &'a str,
    /// Gate entry instant.
    started: Instant,
    /// Current state.
    state: GateState,
    /// Identity once extracted.
    identity: Option<CallIdentity>,
    /// Tuple once mapped.
    tuple: Option<AuthorizationTuple>,
    /// Whether the decision came from the cache.
    cache_hit: bool,
}

impl<'a> CallTrace<'a> {
    /// Starts a trace in `Received`.
    fn new(metadata: &'a CallMetadata, method: &'a str) -> Self {
        Self {
            metadata,
            method,
            started: Instant::now(),
            state: GateState::Received,
            identity: None,
            tuple: None,
            cache_hit: false,
        }
    }

    /// Moves to `next`; an illegal edge lands in `Errored`.
    fn advance(&mut self, next: GateState) {
        self.state =
            if self.state.can_transition_to(next) { next } else { GateState::Errored };
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Authorization gate shared by every in-flight call.
pub struct AuthorizationGate {
    /// Identity extraction strategy.
    extractor: Arc<dyn IdentityExtractor>,
    /// Method to tuple rules.
    registry: Arc<MethodRegistry>,
    /// Decision backend.
    authority: Arc<dyn RbacAuthority>,
    /// Optional decision cache.
    cache: Option<Arc<DecisionCache>>,
    /// Upper bound on the authority round trip.
    call_timeout: Duration,
    /// Audit sink.
    audit: Arc<dyn GateAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn GateMetrics>,
}

impl AuthorizationGate {
    /// Builds a gate without cache, audit, or metrics.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn IdentityExtractor>,
        registry: Arc<MethodRegistry>,
        authority: Arc<dyn RbacAuthority>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            registry,
            authority,
            cache: None,
            call_timeout,
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Returns a copy with a decision cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns a copy with an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn GateAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns a copy with a metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn GateMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the method registry.
    #[must_use]
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Returns the decision cache, when enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&DecisionCache> {
        self.cache.as_deref()
    }

    /// Authorizes one call.
    ///
    /// # Errors
    ///
    /// Returns [`GateRejection`] for every terminal state except `Allowed`.
    pub async fn authorize(
        &self,
        metadata: &CallMetadata,
        method: &str,
        payload: &Value,
    ) -> Result<AuthorizedCall, GateRejection> {
        let mut trace = CallTrace::new(metadata, method);

        let identity = match self.extractor.extract(metadata) {
            Ok(identity) => identity,
            Err(err) => {
                return Err(self.reject(
                    &mut trace,
                    GateState::Errored,
                    GateOutcome::Unauthenticated,
                    err.to_string(),
                ));
            }
        };
        trace.identity = Some(identity.clone());
        trace.advance(GateState::IdentityExtracted);

        let tuple = match self.registry.map(method, payload) {
            Ok(tuple) => tuple,
            Err(err @ MappingError::UnmappedMethod(_)) => {
                return Err(self.reject(
                    &mut trace,
                    GateState::Denied,
                    GateOutcome::Denied,
                    err.to_string(),
                ));
            }
            Err(err @ MappingError::InvalidRequest(_)) => {
                return Err(self.reject(
                    &mut trace,
                    GateState::Errored,
                    GateOutcome::InvalidRequest,
                    err.to_string(),
                ));
            }
        };
        let Some(resolved) = ResultsMethod::parse(method) else {
            return Err(self.reject(
                &mut trace,
                GateState::Denied,
                GateOutcome::Denied,
                format!("registered rule has no results handler: {method}"),
            ));
        };
        trace.tuple = Some(tuple.clone());
        trace.advance(GateState::TupleMapped);
        trace.advance(GateState::DecisionPending);

        let decision = match self.decide(&identity, &tuple).await {
            Ok((decision, cache_hit)) => {
                trace.cache_hit = cache_hit;
                decision
            }
            Err(detail) => {
                return Err(self.reject(
                    &mut trace,
                    GateState::Denied,
                    GateOutcome::Unavailable,
                    detail,
                ));
            }
        };
        if !decision.allowed {
            let detail = decision.reason.clone().unwrap_or_else(|| "denied by authority".into());
            return Err(self.reject(&mut trace, GateState::Denied, GateOutcome::Denied, detail));
        }

        trace.advance(GateState::Allowed);
        self.finish(&trace, GateOutcome::Allowed, "allowed", decision.reason.clone());
        Ok(AuthorizedCall {
            identity,
            tuple,
            method: resolved,
            decision,
            cache_hit: trace.cache_hit,
        })
    }

    /// Resolves a decision from the cache or the authority.
    async fn decide(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
    ) -> Result<(Decision, bool), String> {
        if let Some(cache) = &self.cache
            && let Some(decision) = cache.get(identity, tuple)
        {
            return Ok((decision, true));
        }
        let call = self.authority.authorize(identity, tuple);
        let decision = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(err)) => return Err(err.to_string()),
            Err(_) => {
                return Err(format!(
                    "{} authority timed out after {}ms",
                    self.authority.label(),
                    self.call_timeout.as_millis()
                ));
            }
        };
        if let Some(cache) = &self.cache {
            cache.insert(identity, tuple, &decision);
        }
        Ok((decision, false))
    }

    /// Moves the trace to a rejecting terminal state and records it.
    fn reject(
        &self,
        trace: &mut CallTrace<'_>,
        state: GateState,
        outcome: GateOutcome,
        detail: String,
    ) -> GateRejection {
        trace.advance(state);
        let rejection = GateRejection {
            state: trace.state,
            outcome,
            detail,
        };
        self.finish(trace, outcome, rejection.public_reason(), Some(rejection.detail.clone()));
        rejection
    }

    /// Emits the audit event and metrics for a terminal state.
    fn finish(
        &self,
        trace: &CallTrace<'_>,
        outcome: GateOutcome,
        reason: &str,
        detail: Option<String>,
    ) {
        let latency = trace.started.elapsed();
        let identity = trace.identity.as_ref();
        self.audit.record(&GateAuditEvent::new(GateAuditEventParams {
            request_id: trace.metadata.request_id.clone(),
            peer_ip: trace.metadata.peer_ip.map(|ip| ip.to_string()),
            method: trace.method.to_string(),
            state: trace.state,
            outcome,
            subject: identity.map(|identity| identity.subject().to_string()),
            credential: identity.map(|identity| identity.credential().as_str()),
            fingerprint: identity.and_then(|identity| identity.fingerprint().map(str::to_string)),
            tuple: trace.tuple.clone(),
            cache_hit: trace.cache_hit,
            latency_ms: latency.as_millis(),
            reason: reason.to_string(),
            detail,
        }));
        let event = GateMetricEvent {
            method: ResultsMethod::parse(trace.method).map(ResultsMethod::short_name),
            outcome,
            cache_hit: trace.cache_hit,
        };
        self.metrics.record_decision(&event);
        self.metrics.record_latency(&event, latency);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
