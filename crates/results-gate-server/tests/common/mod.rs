// crates/results-gate-server/tests/common/mod.rs
// =============================================================================
// Module: Server Test Helpers
// Description: Fake authorities, recording sinks, and gate builders.
// Purpose: Assemble gates around fakes without touching the network.
// =============================================================================

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test helpers are selectively used across suites."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use results_gate_config::StaticTokenConfig;
use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::Decision;
use results_gate_core::InMemoryResults;
use results_gate_server::AuthorityError;
use results_gate_server::AuthorizationGate;
use results_gate_server::CachePolicy;
use results_gate_server::CallMetadata;
use results_gate_server::DecisionCache;
use results_gate_server::GateAuditEvent;
use results_gate_server::GateAuditSink;
use results_gate_server::MethodRegistry;
use results_gate_server::ProtectedService;
use results_gate_server::RbacAuthority;
use results_gate_server::identity::StaticTokenExtractor;

/// Token that authenticates as `svc:writer`.
pub const WRITER_TOKEN: &str = "writer-token";
/// Token that authenticates as `svc:reader`.
pub const READER_TOKEN: &str = "reader-token";

/// Decision rule used by [`FakeAuthority`].
type Policy = Box<dyn Fn(&CallIdentity, &AuthorizationTuple) -> bool + Send + Sync>;

/// How the fake authority answers.
pub enum FakeMode {
    /// Evaluate a policy closure.
    Policy(Policy),
    /// Fail every call.
    Fail,
}

/// Authority double that counts round trips.
pub struct FakeAuthority {
    /// Answer strategy.
    mode: FakeMode,
    /// Artificial latency per call.
    delay: Duration,
    /// Number of calls received.
    calls: AtomicUsize,
}

impl FakeAuthority {
    /// Allows everything.
    pub fn allow_all() -> Self {
        Self::policy(|_, _| true)
    }

    /// Denies everything.
    pub fn deny_all() -> Self {
        Self::policy(|_, _| false)
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self {
            mode: FakeMode::Fail,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Evaluates `policy`.
    pub fn policy(
        policy: impl Fn(&CallIdentity, &AuthorizationTuple) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            mode: FakeMode::Policy(Box::new(policy)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Adds latency to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RbacAuthority for FakeAuthority {
    async fn authorize(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
    ) -> Result<Decision, AuthorityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.mode {
            FakeMode::Fail => Err(AuthorityError::Unavailable("fake outage".to_string())),
            FakeMode::Policy(policy) if policy(identity, tuple) => Ok(Decision::allow()),
            FakeMode::Policy(_) => Ok(Decision::deny("fake policy")),
        }
    }

    fn label(&self) -> &'static str {
        "fake"
    }
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAudit {
    /// Recorded events.
    events: Mutex<Vec<GateAuditEvent>>,
}

impl RecordingAudit {
    /// Returns a snapshot of recorded events.
    pub fn events(&self) -> Vec<GateAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl GateAuditSink for RecordingAudit {
    fn record(&self, event: &GateAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Token table shared by gate tests.
pub fn static_tokens() -> Vec<StaticTokenConfig> {
    vec![
        StaticTokenConfig {
            token: WRITER_TOKEN.to_string(),
            subject: "svc:writer".to_string(),
            groups: vec!["writers".to_string()],
            expires_at: None,
        },
        StaticTokenConfig {
            token: READER_TOKEN.to_string(),
            subject: "svc:reader".to_string(),
            groups: vec!["readers".to_string()],
            expires_at: None,
        },
    ]
}

/// Fully assembled gate under test.
pub struct Harness {
    /// Gated service over an in-memory handler.
    pub service: ProtectedService,
    /// Handler behind the gate.
    pub handler: InMemoryResults,
    /// Authority double.
    pub authority: Arc<FakeAuthority>,
    /// Recorded audit events.
    pub audit: Arc<RecordingAudit>,
}

/// Builds a harness with the given authority, timeout, and optional cache.
pub fn harness(
    authority: FakeAuthority,
    call_timeout: Duration,
    cache: Option<CachePolicy>,
) -> Harness {
    let authority = Arc::new(authority);
    let audit = Arc::new(RecordingAudit::default());
    let handler = InMemoryResults::new();
    let mut gate = AuthorizationGate::new(
        Arc::new(StaticTokenExtractor::new(&static_tokens(), 0)),
        Arc::new(MethodRegistry::results_defaults()),
        Arc::clone(&authority) as Arc<dyn RbacAuthority>,
        call_timeout,
    )
    .with_audit(Arc::clone(&audit) as Arc<dyn GateAuditSink>);
    if let Some(policy) = cache {
        gate = gate.with_cache(Arc::new(DecisionCache::new(policy)));
    }
    let service = ProtectedService::new(Arc::new(gate), Arc::new(handler.clone()));
    Harness {
        service,
        handler,
        authority,
        audit,
    }
}

/// Metadata presenting a bearer token.
pub fn bearer(token: &str) -> CallMetadata {
    CallMetadata::new().with_bearer(token)
}

/// A short-lived cache policy.
pub fn short_cache(allow_ttl: Duration) -> CachePolicy {
    CachePolicy {
        allow_ttl,
        deny_ttl: allow_ttl,
        max_entries: 128,
    }
}
