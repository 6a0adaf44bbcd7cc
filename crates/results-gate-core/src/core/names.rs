// crates/results-gate-core/src/core/names.rs
// ============================================================================
// Module: Resource Names
// Description: Parsing for hierarchical results resource names.
// Purpose: Derive namespace and resource identifiers from request fields.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Results resources are addressed by slash-separated names:
//!
//! - `<namespace>`
//! - `<namespace>/results/<result>`
//! - `<namespace>/results/<result>/records/<record>`
//!
//! The namespace is always the first segment. The result segment of a list
//! parent may be the wildcard `-`, meaning "every result in the namespace".
//! Security posture: names come from untrusted payloads; parsing is strict and
//! bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wildcard result identifier accepted in list parents.
pub const WILDCARD_ID: &str = "-";
/// Maximum namespace length (Kubernetes DNS label).
const MAX_NAMESPACE_LENGTH: usize = 63;
/// Maximum result or record identifier length.
const MAX_ID_LENGTH: usize = 253;
/// Maximum total name length.
const MAX_NAME_LENGTH: usize = 1024;
/// Collection segment for results.
const RESULTS_SEGMENT: &str = "results";
/// Collection segment for records.
const RECORDS_SEGMENT: &str = "records";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Parsed results resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePath {
    /// A namespace (parent of results).
    Namespace {
        /// Namespace name.
        namespace: String,
    },
    /// A result (parent of records).
    Result {
        /// Namespace name.
        namespace: String,
        /// Result identifier, possibly the wildcard.
        result: String,
    },
    /// A single record.
    Record {
        /// Namespace name.
        namespace: String,
        /// Result identifier.
        result: String,
        /// Record identifier.
        record: String,
    },
}

impl ResourcePath {
    /// Parses a resource name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] when the name does not follow the grammar.
    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong);
        }
        let segments: Vec<&str> = name.split('/').collect();
        match segments.as_slice() {
            [namespace] => {
                validate_namespace(namespace)?;
                Ok(Self::Namespace {
                    namespace: (*namespace).to_string(),
                })
            }
            [namespace, RESULTS_SEGMENT, result] => {
                validate_namespace(namespace)?;
                validate_id(result, true)?;
                Ok(Self::Result {
                    namespace: (*namespace).to_string(),
                    result: (*result).to_string(),
                })
            }
            [namespace, RESULTS_SEGMENT, result, RECORDS_SEGMENT, record] => {
                validate_namespace(namespace)?;
                validate_id(result, false)?;
                validate_id(record, false)?;
                Ok(Self::Record {
                    namespace: (*namespace).to_string(),
                    result: (*result).to_string(),
                    record: (*record).to_string(),
                })
            }
            _ => Err(NameError::Malformed(name.to_string())),
        }
    }

    /// Returns the namespace segment.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Namespace {
                namespace,
            }
            | Self::Result {
                namespace, ..
            }
            | Self::Record {
                namespace, ..
            } => namespace,
        }
    }

    /// Returns the identifier of the addressed leaf, if any.
    ///
    /// Wildcard result identifiers and bare namespaces have no leaf.
    #[must_use]
    pub fn leaf_id(&self) -> Option<&str> {
        match self {
            Self::Namespace {
                ..
            } => None,
            Self::Result {
                result, ..
            } => (result != WILDCARD_ID).then_some(result.as_str()),
            Self::Record {
                record, ..
            } => Some(record.as_str()),
        }
    }

    /// Returns true when the result segment is the wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Result { result, .. } if result == WILDCARD_ID)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace {
                namespace,
            } => f.write_str(namespace),
            Self::Result {
                namespace,
                result,
            } => write!(f, "{namespace}/{RESULTS_SEGMENT}/{result}"),
            Self::Record {
                namespace,
                result,
                record,
            } => write!(f, "{namespace}/{RESULTS_SEGMENT}/{result}/{RECORDS_SEGMENT}/{record}"),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resource name parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name is empty.
    #[error("resource name is empty")]
    Empty,
    /// The name exceeds the maximum length.
    #[error("resource name exceeds max length")]
    TooLong,
    /// The namespace segment is invalid.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    /// A result or record identifier is invalid.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    /// The name does not follow the grammar.
    #[error("malformed resource name: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a namespace as a Kubernetes DNS label.
fn validate_namespace(value: &str) -> Result<(), NameError> {
    let valid = !value.is_empty()
        && value.len() <= MAX_NAMESPACE_LENGTH
        && value.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if valid { Ok(()) } else { Err(NameError::InvalidNamespace(value.to_string())) }
}

/// Validates a result or record identifier.
fn validate_id(value: &str, allow_wildcard: bool) -> Result<(), NameError> {
    if value == WILDCARD_ID {
        return if allow_wildcard { Ok(()) } else { Err(NameError::InvalidId(value.to_string())) };
    }
    let valid = !value.is_empty()
        && value.len() <= MAX_ID_LENGTH
        && value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid { Ok(()) } else { Err(NameError::InvalidId(value.to_string())) }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
