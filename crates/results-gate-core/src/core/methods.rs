// crates/results-gate-core/src/core/methods.rs
// ============================================================================
// Module: Results Method Catalog
// Description: The set of RPC methods exposed by the results service.
// Purpose: Provide stable method identifiers for routing and registration.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Methods are identified on the wire either by their fully-qualified name
//! (`tekton.results.v1alpha2.Results/CreateResult`, optionally with a leading
//! slash) or by their short name (`CreateResult`). [`ResultsMethod::ALL`] is the
//! authoritative list of exposed methods; startup checks that every entry has
//! an authorization rule.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fully-qualified results service name.
pub const RESULTS_SERVICE: &str = "tekton.results.v1alpha2.Results";

// ============================================================================
// SECTION: Methods
// ============================================================================

/// Results service RPC methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResultsMethod {
    /// Create a result in a namespace.
    CreateResult,
    /// Read a result.
    GetResult,
    /// Modify a result.
    UpdateResult,
    /// Remove a result and its records.
    DeleteResult,
    /// Enumerate results in a namespace.
    ListResults,
    /// Create a record under a result.
    CreateRecord,
    /// Read a record.
    GetRecord,
    /// Modify a record.
    UpdateRecord,
    /// Remove a record.
    DeleteRecord,
    /// Enumerate records under a result.
    ListRecords,
}

impl ResultsMethod {
    /// Every exposed method, in registration order.
    pub const ALL: [Self; 10] = [
        Self::CreateResult,
        Self::GetResult,
        Self::UpdateResult,
        Self::DeleteResult,
        Self::ListResults,
        Self::CreateRecord,
        Self::GetRecord,
        Self::UpdateRecord,
        Self::DeleteRecord,
        Self::ListRecords,
    ];

    /// Returns the short method name.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::CreateResult => "CreateResult",
            Self::GetResult => "GetResult",
            Self::UpdateResult => "UpdateResult",
            Self::DeleteResult => "DeleteResult",
            Self::ListResults => "ListResults",
            Self::CreateRecord => "CreateRecord",
            Self::GetRecord => "GetRecord",
            Self::UpdateRecord => "UpdateRecord",
            Self::DeleteRecord => "DeleteRecord",
            Self::ListRecords => "ListRecords",
        }
    }

    /// Returns the fully-qualified method name.
    #[must_use]
    pub fn full_name(self) -> String {
        format!("{RESULTS_SERVICE}/{}", self.short_name())
    }

    /// Parses a full or short method name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let short = normalize_method_name(name)?;
        Self::ALL.into_iter().find(|method| method.short_name() == short)
    }
}

impl fmt::Display for ResultsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reduces a method identifier to its short name.
///
/// Accepts `Method`, `Service/Method`, and `/Service/Method`. Returns `None`
/// when a service prefix is present but is not the results service.
#[must_use]
pub fn normalize_method_name(name: &str) -> Option<&str> {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    match trimmed.split_once('/') {
        None => (!trimmed.is_empty()).then_some(trimmed),
        Some((service, method)) => {
            (service == RESULTS_SERVICE && !method.is_empty() && !method.contains('/'))
                .then_some(method)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ResultsMethod;
    use super::normalize_method_name;

    #[test]
    fn parse_accepts_full_and_short_names() {
        for method in ResultsMethod::ALL {
            assert_eq!(ResultsMethod::parse(method.short_name()), Some(method));
            assert_eq!(ResultsMethod::parse(&method.full_name()), Some(method));
            assert_eq!(ResultsMethod::parse(&format!("/{}", method.full_name())), Some(method));
        }
    }

    #[test]
    fn parse_rejects_foreign_services() {
        assert_eq!(ResultsMethod::parse("other.Service/GetResult"), None);
        assert_eq!(ResultsMethod::parse("GetResults"), None);
        assert_eq!(normalize_method_name(""), None);
        assert_eq!(normalize_method_name("tekton.results.v1alpha2.Results/"), None);
    }
}
