// crates/results-gate-core/src/lib.rs
// ============================================================================
// Module: Results Gate Core Library
// Description: Public API surface for the Results Gate core.
// Purpose: Expose authorization data types, the results API model, and handlers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Results Gate core defines the data model shared by every layer of the
//! authorization gate: call identities, authorization tuples, decisions, the
//! results API method catalog, and resource name parsing. It also defines the
//! [`ResultsHandler`] seam that the gate protects, plus an in-memory handler
//! used by standalone deployments and tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use interfaces::HandlerError;
pub use interfaces::ResultsHandler;
pub use runtime::InMemoryResults;
