// crates/results-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Results Gate Runtime
// Description: Reference handler implementations.
// Purpose: Provide a results handler for standalone deployments and tests.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement [`crate::ResultsHandler`] without external
//! storage. They exist so the authorization gate has real business logic to
//! protect end to end.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod memory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use memory::InMemoryResults;
