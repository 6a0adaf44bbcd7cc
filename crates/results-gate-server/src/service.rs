// crates/results-gate-server/src/service.rs
// ============================================================================
// Module: Protected Results Service
// Description: Gate-then-dispatch wrapper around a results handler.
// Purpose: Guarantee handlers only run for allowed calls.
// Dependencies: results-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`ProtectedService::call`] runs the authorization gate, then decodes the
//! payload into the typed request and dispatches it. The handler is reached
//! only through an [`AuthorizedCall`], so there is no path to business logic
//! that skips the gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use results_gate_core::HandlerError;
use results_gate_core::ResultsHandler;
use results_gate_core::ResultsMethod;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::gate::AuthorizationGate;
use crate::gate::AuthorizedCall;
use crate::gate::GateRejection;
use crate::gate::REASON_INVALID_REQUEST;
use crate::identity::CallMetadata;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures surfaced to callers of the protected service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The gate refused the call.
    #[error(transparent)]
    Rejected(#[from] GateRejection),
    /// The allowed payload did not decode into the typed request.
    #[error("invalid request: {0}")]
    Decode(String),
    /// The handler failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ServiceError {
    /// Returns the JSON-RPC error code.
    #[must_use]
    pub const fn jsonrpc_code(&self) -> i64 {
        match self {
            Self::Rejected(rejection) => rejection.jsonrpc_code(),
            Self::Decode(_) | Self::Handler(HandlerError::InvalidArgument(_)) => -32602,
            Self::Handler(HandlerError::NotFound(_)) => -32004,
            Self::Handler(HandlerError::AlreadyExists(_)) => -32009,
            Self::Handler(HandlerError::Internal(_)) => -32050,
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Rejected(rejection) => rejection.http_status(),
            Self::Decode(_) | Self::Handler(HandlerError::InvalidArgument(_)) => 400,
            Self::Handler(HandlerError::NotFound(_)) => 404,
            Self::Handler(HandlerError::AlreadyExists(_)) => 409,
            Self::Handler(HandlerError::Internal(_)) => 500,
        }
    }

    /// Returns the caller-visible message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Rejected(rejection) => rejection.public_reason().to_string(),
            Self::Decode(_) => REASON_INVALID_REQUEST.to_string(),
            Self::Handler(HandlerError::Internal(_)) => "internal error".to_string(),
            Self::Handler(err) => err.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Results service protected by the authorization gate.
#[derive(Clone)]
pub struct ProtectedService {
    /// Authorization gate.
    gate: Arc<AuthorizationGate>,
    /// Business-logic handler.
    handler: Arc<dyn ResultsHandler>,
}

impl ProtectedService {
    /// Methods this service dispatches; every one needs a mapping rule.
    pub const SERVED_METHODS: &'static [ResultsMethod] = &ResultsMethod::ALL;

    /// Wraps a handler with a gate.
    #[must_use]
    pub fn new(gate: Arc<AuthorizationGate>, handler: Arc<dyn ResultsHandler>) -> Self {
        Self {
            gate,
            handler,
        }
    }

    /// Returns the gate.
    #[must_use]
    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Authorizes and executes one call.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the gate rejects the call, the payload
    /// does not decode, or the handler fails.
    pub async fn call(
        &self,
        metadata: &CallMetadata,
        method: &str,
        params: Value,
    ) -> Result<Value, ServiceError> {
        let authorized = self.gate.authorize(metadata, method, &params).await?;
        self.dispatch(&authorized, params)
    }

    /// Invokes the handler for an authorized call.
    fn dispatch(&self, call: &AuthorizedCall, params: Value) -> Result<Value, ServiceError> {
        let handler = self.handler.as_ref();
        let caller = &call.identity;
        match call.method {
            ResultsMethod::CreateResult => encode(handler.create_result(caller, decode(params)?)),
            ResultsMethod::GetResult => encode(handler.get_result(caller, decode(params)?)),
            ResultsMethod::UpdateResult => encode(handler.update_result(caller, decode(params)?)),
            ResultsMethod::DeleteResult => {
                handler.delete_result(caller, decode(params)?)?;
                Ok(Value::Object(serde_json::Map::new()))
            }
            ResultsMethod::ListResults => encode(handler.list_results(caller, decode(params)?)),
            ResultsMethod::CreateRecord => encode(handler.create_record(caller, decode(params)?)),
            ResultsMethod::GetRecord => encode(handler.get_record(caller, decode(params)?)),
            ResultsMethod::UpdateRecord => encode(handler.update_record(caller, decode(params)?)),
            ResultsMethod::DeleteRecord => {
                handler.delete_record(caller, decode(params)?)?;
                Ok(Value::Object(serde_json::Map::new()))
            }
            ResultsMethod::ListRecords => encode(handler.list_records(caller, decode(params)?)),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes a payload into a typed request.
fn decode<T: DeserializeOwned>(params: Value) -> Result<T, ServiceError> {
    serde_json::from_value(params).map_err(|err| ServiceError::Decode(err.to_string()))
}

/// Encodes a handler response.
fn encode<T: Serialize>(result: Result<T, HandlerError>) -> Result<Value, ServiceError> {
    let response = result?;
    serde_json::to_value(response)
        .map_err(|err| ServiceError::Handler(HandlerError::Internal(err.to_string())))
}
