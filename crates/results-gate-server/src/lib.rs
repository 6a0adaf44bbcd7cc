// crates/results-gate-server/src/lib.rs
// ============================================================================
// Module: Results Gate Server
// Description: Authorization gate and transport for the results API.
// Purpose: Decide every results call against RBAC before any handler runs.
// Dependencies: results-gate-core, results-gate-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! Each results call passes through identity extraction, resource mapping,
//! and an RBAC decision before the handler sees it. The pieces are
//! constructed explicitly by [`ResultsGateServer`] and can be assembled by
//! hand around fakes for testing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod authority;
pub mod cache;
pub mod gate;
pub mod identity;
pub mod mapper;
pub mod server;
pub mod service;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SecurityAuditEvent;
pub use audit::StderrAuditSink;
pub use authority::AuthorityError;
pub use authority::KubernetesAuthority;
pub use authority::RbacAuthority;
pub use authority::StaticRbacAuthority;
pub use cache::CachePolicy;
pub use cache::DecisionCache;
pub use gate::AuthorizationGate;
pub use gate::AuthorizedCall;
pub use gate::GateRejection;
pub use gate::GateState;
pub use identity::AuthenticationError;
pub use identity::CallMetadata;
pub use identity::IdentityExtractor;
pub use mapper::MappingError;
pub use mapper::MethodRegistry;
pub use mapper::MethodRule;
pub use mapper::RegistryError;
pub use results_gate_config as config;
pub use server::ResultsGateServer;
pub use server::ServerError;
pub use service::ProtectedService;
pub use service::ServiceError;
pub use telemetry::DecisionStats;
pub use telemetry::DecisionStatsSnapshot;
pub use telemetry::GATE_LATENCY_BUCKETS_MS;
pub use telemetry::GateMetricEvent;
pub use telemetry::GateMetrics;
pub use telemetry::GateOutcome;
pub use telemetry::NoopMetrics;
