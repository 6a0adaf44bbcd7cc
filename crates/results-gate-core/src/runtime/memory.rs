// crates/results-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Results Handler
// Description: Map-backed results and records for standalone deployments.
// Purpose: Give the authorization gate a real handler to protect.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryResults`] keeps results and records in ordered maps keyed by full
//! resource name. Ordering by name makes pagination a range scan: the page
//! token is the name of the last item returned.
//!
//! ## Invariants
//! - A record's parent result always exists; deleting a result removes its
//!   records.
//! - Names are validated with [`ResourcePath::parse`] before any mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

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
use crate::core::ResourcePath;
use crate::core::ResultResource;
use crate::core::UpdateRecordRequest;
use crate::core::UpdateResultRequest;
use crate::interfaces::HandlerError;
use crate::interfaces::ResultsHandler;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used when the request omits one.
const DEFAULT_PAGE_SIZE: usize = 50;
/// Largest page size honored.
const MAX_PAGE_SIZE: usize = 1000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Mutable handler state.
#[derive(Debug, Default)]
struct ResultsState {
    /// Results keyed by full name.
    results: BTreeMap<String, ResultResource>,
    /// Records keyed by full name.
    records: BTreeMap<String, RecordResource>,
    /// Counter for server-assigned identifiers.
    next_id: u64,
}

impl ResultsState {
    /// Returns the caller's identifier or allocates a fresh one.
    fn assign_id(&mut self, requested: Option<String>) -> String {
        requested.filter(|id| !id.is_empty()).unwrap_or_else(|| {
            self.next_id += 1;
            format!("{:016x}", self.next_id)
        })
    }
}

/// In-memory results handler.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResults {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<ResultsState>>,
}

impl InMemoryResults {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored results.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.lock().map_or(0, |state| state.results.len())
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.lock().map_or(0, |state| state.records.len())
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, ResultsState>, HandlerError> {
        self.state
            .lock()
            .map_err(|_| HandlerError::Internal("results state mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

impl ResultsHandler for InMemoryResults {
    fn create_result(
        &self,
        _caller: &CallIdentity,
        request: CreateResultRequest,
    ) -> Result<ResultResource, HandlerError> {
        let namespace = parse_namespace(&request.parent)?;
        let mut state = self.lock()?;
        let id = state.assign_id(request.result_id);
        let name = format!("{namespace}/results/{id}");
        ensure_result_name(&name)?;
        if state.results.contains_key(&name) {
            return Err(HandlerError::AlreadyExists(name));
        }
        let now = now_ms();
        let result = ResultResource {
            name: name.clone(),
            id,
            annotations: request.annotations,
            create_time_ms: now,
            update_time_ms: now,
        };
        state.results.insert(name, result.clone());
        Ok(result)
    }

    fn get_result(
        &self,
        _caller: &CallIdentity,
        request: GetResultRequest,
    ) -> Result<ResultResource, HandlerError> {
        ensure_result_name(&request.name)?;
        let state = self.lock()?;
        state.results.get(&request.name).cloned().ok_or(HandlerError::NotFound(request.name))
    }

    fn update_result(
        &self,
        _caller: &CallIdentity,
        request: UpdateResultRequest,
    ) -> Result<ResultResource, HandlerError> {
        ensure_result_name(&request.name)?;
        let mut state = self.lock()?;
        let result = state
            .results
            .get_mut(&request.name)
            .ok_or_else(|| HandlerError::NotFound(request.name.clone()))?;
        result.annotations = request.annotations;
        result.update_time_ms = now_ms();
        Ok(result.clone())
    }

    fn delete_result(
        &self,
        _caller: &CallIdentity,
        request: DeleteResultRequest,
    ) -> Result<(), HandlerError> {
        ensure_result_name(&request.name)?;
        let mut state = self.lock()?;
        if state.results.remove(&request.name).is_none() {
            return Err(HandlerError::NotFound(request.name));
        }
        let prefix = format!("{}/records/", request.name);
        state.records.retain(|name, _| !name.starts_with(&prefix));
        Ok(())
    }

    fn list_results(
        &self,
        _caller: &CallIdentity,
        request: ListResultsRequest,
    ) -> Result<ListResultsResponse, HandlerError> {
        let namespace = parse_namespace(&request.parent)?;
        let prefix = format!("{namespace}/results/");
        let state = self.lock()?;
        let (results, next_page_token) =
            page(&state.results, &prefix, request.page_size, request.page_token.as_deref())?;
        Ok(ListResultsResponse {
            results,
            next_page_token,
        })
    }

    fn create_record(
        &self,
        _caller: &CallIdentity,
        request: CreateRecordRequest,
    ) -> Result<RecordResource, HandlerError> {
        ensure_result_name(&request.parent)?;
        let mut state = self.lock()?;
        if !state.results.contains_key(&request.parent) {
            return Err(HandlerError::NotFound(request.parent));
        }
        let id = state.assign_id(request.record_id);
        let name = format!("{}/records/{id}", request.parent);
        match ResourcePath::parse(&name) {
            Ok(ResourcePath::Record {
                ..
            }) => {}
            Ok(_) => {
                return Err(HandlerError::InvalidArgument(format!("not a record name: {name}")));
            }
            Err(err) => return Err(HandlerError::InvalidArgument(err.to_string())),
        }
        if state.records.contains_key(&name) {
            return Err(HandlerError::AlreadyExists(name));
        }
        let now = now_ms();
        let record = RecordResource {
            name: name.clone(),
            id,
            data_type: request.data_type,
            data: request.data,
            create_time_ms: now,
            update_time_ms: now,
        };
        state.records.insert(name, record.clone());
        Ok(record)
    }

    fn get_record(
        &self,
        _caller: &CallIdentity,
        request: GetRecordRequest,
    ) -> Result<RecordResource, HandlerError> {
        ensure_record_name(&request.name)?;
        let state = self.lock()?;
        state.records.get(&request.name).cloned().ok_or(HandlerError::NotFound(request.name))
    }

    fn update_record(
        &self,
        _caller: &CallIdentity,
        request: UpdateRecordRequest,
    ) -> Result<RecordResource, HandlerError> {
        ensure_record_name(&request.name)?;
        let mut state = self.lock()?;
        let record = state
            .records
            .get_mut(&request.name)
            .ok_or_else(|| HandlerError::NotFound(request.name.clone()))?;
        record.data_type = request.data_type;
        record.data = request.data;
        record.update_time_ms = now_ms();
        Ok(record.clone())
    }

    fn delete_record(
        &self,
        _caller: &CallIdentity,
        request: DeleteRecordRequest,
    ) -> Result<(), HandlerError> {
        ensure_record_name(&request.name)?;
        let mut state = self.lock()?;
        state.records.remove(&request.name).map(|_| ()).ok_or(HandlerError::NotFound(request.name))
    }

    fn list_records(
        &self,
        _caller: &CallIdentity,
        request: ListRecordsRequest,
    ) -> Result<ListRecordsResponse, HandlerError> {
        let parent = ResourcePath::parse(&request.parent)
            .map_err(|err| HandlerError::InvalidArgument(err.to_string()))?;
        let ResourcePath::Result {
            namespace, ..
        } = &parent
        else {
            return Err(HandlerError::InvalidArgument(format!(
                "not a result name: {}",
                request.parent
            )));
        };
        let state = self.lock()?;
        let prefix = if parent.is_wildcard() {
            format!("{namespace}/results/")
        } else {
            if !state.results.contains_key(&request.parent) {
                return Err(HandlerError::NotFound(request.parent));
            }
            format!("{}/records/", request.parent)
        };
        let (records, next_page_token) =
            page(&state.records, &prefix, request.page_size, request.page_token.as_deref())?;
        Ok(ListRecordsResponse {
            records,
            next_page_token,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a list or create parent that must be a bare namespace.
fn parse_namespace(parent: &str) -> Result<String, HandlerError> {
    match ResourcePath::parse(parent) {
        Ok(ResourcePath::Namespace {
            namespace,
        }) => Ok(namespace),
        Ok(_) => Err(HandlerError::InvalidArgument(format!("not a namespace: {parent}"))),
        Err(err) => Err(HandlerError::InvalidArgument(err.to_string())),
    }
}

/// Ensures a name addresses a single result.
fn ensure_result_name(name: &str) -> Result<(), HandlerError> {
    match ResourcePath::parse(name) {
        Ok(path @ ResourcePath::Result {
            ..
        }) if !path.is_wildcard() => Ok(()),
        Ok(_) => Err(HandlerError::InvalidArgument(format!("not a result name: {name}"))),
        Err(err) => Err(HandlerError::InvalidArgument(err.to_string())),
    }
}

/// Ensures a name addresses a single record.
fn ensure_record_name(name: &str) -> Result<(), HandlerError> {
    match ResourcePath::parse(name) {
        Ok(ResourcePath::Record {
            ..
        }) => Ok(()),
        Ok(_) => Err(HandlerError::InvalidArgument(format!("not a record name: {name}"))),
        Err(err) => Err(HandlerError::InvalidArgument(err.to_string())),
    }
}

/// Returns one page of entries under `prefix`, starting after `token`.
fn page<T: Clone>(
    entries: &BTreeMap<String, T>,
    prefix: &str,
    page_size: Option<usize>,
    token: Option<&str>,
) -> Result<(Vec<T>, Option<String>), HandlerError> {
    let size = page_size.filter(|size| *size > 0).unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let start = match token.filter(|token| !token.is_empty()) {
        Some(token) if token.starts_with(prefix) => Bound::Excluded(token.to_string()),
        Some(_) => return Err(HandlerError::InvalidArgument("invalid page token".to_string())),
        None => Bound::Included(prefix.to_string()),
    };
    let mut matching = entries
        .range((start, Bound::Unbounded))
        .take_while(|(name, _)| name.starts_with(prefix));
    let items: Vec<(&String, &T)> = matching.by_ref().take(size).collect();
    let next = if matching.next().is_some() {
        items.last().map(|(name, _)| (*name).clone())
    } else {
        None
    };
    Ok((items.into_iter().map(|(_, value)| value.clone()).collect(), next))
}

/// Returns the current time in milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis())
}
