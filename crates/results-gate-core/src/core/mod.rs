// crates/results-gate-core/src/core/mod.rs
// ============================================================================
// Module: Results Gate Core Types
// Description: Data model for identities, tuples, decisions, and the results API.
// Purpose: Group the pure, side-effect-free types used by the gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types are plain data. Nothing in this module performs I/O, so every
//! type can be constructed freely in tests and derived deterministically from
//! request payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod authz;
pub mod identity;
pub mod methods;
pub mod names;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::CreateRecordRequest;
pub use api::CreateResultRequest;
pub use api::DeleteRecordRequest;
pub use api::DeleteResultRequest;
pub use api::GetRecordRequest;
pub use api::GetResultRequest;
pub use api::ListRecordsRequest;
pub use api::ListRecordsResponse;
pub use api::ListResultsRequest;
pub use api::ListResultsResponse;
pub use api::RecordResource;
pub use api::ResultResource;
pub use api::UpdateRecordRequest;
pub use api::UpdateResultRequest;
pub use authz::API_GROUP;
pub use authz::AuthorizationTuple;
pub use authz::Decision;
pub use authz::ResourceType;
pub use authz::Verb;
pub use identity::CallIdentity;
pub use identity::CredentialKind;
pub use identity::IdentityKey;
pub use methods::RESULTS_SERVICE;
pub use methods::ResultsMethod;
pub use methods::normalize_method_name;
pub use names::NameError;
pub use names::ResourcePath;
pub use names::WILDCARD_ID;
