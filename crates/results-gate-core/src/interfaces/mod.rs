// crates/results-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Results Gate Interfaces
// Description: Backend-agnostic seams protected by the authorization gate.
// Purpose: Define the business-logic handler contract.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! [`ResultsHandler`] is the business-logic seam. The gate never calls it
//! directly; the protected service invokes it only after an allow decision for
//! the exact call. Implementations may assume the caller is authorized for the
//! request's tuple but must still validate payload contents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::CallIdentity;
use crate::core::CreateRecordRequest;
use crate::core::CreateResultRequest;
use crate::core::DeleteRecordRequest;
use crate::core::DeleteResultRequest;
use crate::core::GetRecordRequest;
use crate::core::GetResultRequest;
use crate::core::ListRecordsRequest;
use crate::core::ListRecordsResponse;
use crate::core::ListResultsRequest;
use crate::core::ListResultsResponse;
use crate::core::RecordResource;
use crate::core::ResultResource;
use crate::core::UpdateRecordRequest;
use crate::core::UpdateResultRequest;

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Results service business logic.
pub trait ResultsHandler: Send + Sync {
    /// Creates a result.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the result cannot be created.
    fn create_result(
        &self,
        caller: &CallIdentity,
        request: CreateResultRequest,
    ) -> Result<ResultResource, HandlerError>;

    /// Reads a result.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the result cannot be read.
    fn get_result(
        &self,
        caller: &CallIdentity,
        request: GetResultRequest,
    ) -> Result<ResultResource, HandlerError>;

    /// Updates a result.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the result cannot be updated.
    fn update_result(
        &self,
        caller: &CallIdentity,
        request: UpdateResultRequest,
    ) -> Result<ResultResource, HandlerError>;

    /// Deletes a result.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the result cannot be deleted.
    fn delete_result(
        &self,
        caller: &CallIdentity,
        request: DeleteResultRequest,
    ) -> Result<(), HandlerError>;

    /// Lists results.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the listing fails.
    fn list_results(
        &self,
        caller: &CallIdentity,
        request: ListResultsRequest,
    ) -> Result<ListResultsResponse, HandlerError>;

    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the record cannot be created.
    fn create_record(
        &self,
        caller: &CallIdentity,
        request: CreateRecordRequest,
    ) -> Result<RecordResource, HandlerError>;

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the record cannot be read.
    fn get_record(
        &self,
        caller: &CallIdentity,
        request: GetRecordRequest,
    ) -> Result<RecordResource, HandlerError>;

    /// Updates a record.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the record cannot be updated.
    fn update_record(
        &self,
        caller: &CallIdentity,
        request: UpdateRecordRequest,
    ) -> Result<RecordResource, HandlerError>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the record cannot be deleted.
    fn delete_record(
        &self,
        caller: &CallIdentity,
        request: DeleteRecordRequest,
    ) -> Result<(), HandlerError>;

    /// Lists records.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the listing fails.
    fn list_records(
        &self,
        caller: &CallIdentity,
        request: ListRecordsRequest,
    ) -> Result<ListRecordsResponse, HandlerError>;
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Handler failures surfaced to callers after authorization succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A resource with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The request payload is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Internal handler failure.
    #[error("internal error: {0}")]
    Internal(String),
}
