// crates/results-gate-core/src/core/api.rs
// ============================================================================
// Module: Results API Messages
// Description: Request and response payloads for the results service.
// Purpose: Provide typed decoding for protected handler calls.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These messages mirror the results service surface: results group records,
//! both are addressed by hierarchical names (see [`crate::ResourcePath`]).
//! The authorization gate reads the raw JSON payload; handlers decode it into
//! these types only after the gate allows the call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Resources
// ============================================================================

/// A stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResource {
    /// Full resource name (`<namespace>/results/<id>`).
    pub name: String,
    /// Result identifier.
    pub id: String,
    /// Free-form annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Creation time (milliseconds since epoch).
    pub create_time_ms: u128,
    /// Last update time (milliseconds since epoch).
    pub update_time_ms: u128,
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResource {
    /// Full resource name (`<namespace>/results/<result>/records/<id>`).
    pub name: String,
    /// Record identifier.
    pub id: String,
    /// Record payload type label.
    #[serde(default)]
    pub data_type: String,
    /// Record payload.
    #[serde(default)]
    pub data: Value,
    /// Creation time (milliseconds since epoch).
    pub create_time_ms: u128,
    /// Last update time (milliseconds since epoch).
    pub update_time_ms: u128,
}

// ============================================================================
// SECTION: Result Requests
// ============================================================================

/// Creates a result under a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResultRequest {
    /// Parent namespace.
    pub parent: String,
    /// Requested result identifier; server-assigned when absent.
    #[serde(default)]
    pub result_id: Option<String>,
    /// Initial annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Reads a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResultRequest {
    /// Result name.
    pub name: String,
}

/// Replaces a result's annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResultRequest {
    /// Result name.
    pub name: String,
    /// Replacement annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Removes a result and every record under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResultRequest {
    /// Result name.
    pub name: String,
}

/// Lists results in a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResultsRequest {
    /// Parent namespace.
    pub parent: String,
    /// Maximum results per page.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Opaque continuation token from a previous page.
    #[serde(default)]
    pub page_token: Option<String>,
}

/// Page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResultsResponse {
    /// Results in name order.
    pub results: Vec<ResultResource>,
    /// Token for the next page, when more results exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

// ============================================================================
// SECTION: Record Requests
// ============================================================================

/// Creates a record under a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    /// Parent result name.
    pub parent: String,
    /// Requested record identifier; server-assigned when absent.
    #[serde(default)]
    pub record_id: Option<String>,
    /// Record payload type label.
    #[serde(default)]
    pub data_type: String,
    /// Record payload.
    #[serde(default)]
    pub data: Value,
}

/// Reads a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRecordRequest {
    /// Record name.
    pub name: String,
}

/// Replaces a record's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecordRequest {
    /// Record name.
    pub name: String,
    /// Record payload type label.
    #[serde(default)]
    pub data_type: String,
    /// Replacement payload.
    #[serde(default)]
    pub data: Value,
}

/// Removes a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRecordRequest {
    /// Record name.
    pub name: String,
}

/// Lists records under a result (or every result, with the `-` wildcard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsRequest {
    /// Parent result name.
    pub parent: String,
    /// Maximum records per page.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Opaque continuation token from a previous page.
    #[serde(default)]
    pub page_token: Option<String>,
}

/// Page of records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    /// Records in name order.
    pub records: Vec<RecordResource>,
    /// Token for the next page, when more records exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
