// crates/results-gate-core/src/core/authz.rs
// ============================================================================
// Module: Authorization Tuples
// Description: Resource types, verbs, tuples, and decisions for RBAC checks.
// Purpose: Normalize what a call attempts to do into a cluster RBAC request.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`AuthorizationTuple`] is the normalized description of a results call:
//! the namespace it touches, the resource type, the verb, and an optional
//! resource name. Tuples are derived deterministically from the method and its
//! payload and are the unit the RBAC authority evaluates.
//!
//! ## Invariants
//! - Tuples are plain data; equality and hashing cover every field so cached
//!   decisions never leak across tuples.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API group that owns the results resources in the cluster RBAC model.
pub const API_GROUP: &str = "results.tekton.dev";

// ============================================================================
// SECTION: Resource Types
// ============================================================================

/// Resource types protected by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A result groups the records produced by one execution.
    Result,
    /// A record is a single typed payload stored under a result.
    Record,
}

impl ResourceType {
    /// Returns the RBAC resource (plural) name.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Result => "results",
            Self::Record => "records",
        }
    }

    /// Parses an RBAC resource name (plural or singular).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "results" | "result" => Some(Self::Result),
            "records" | "record" => Some(Self::Record),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

// ============================================================================
// SECTION: Verbs
// ============================================================================

/// RBAC verbs understood by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Read a single resource.
    Get,
    /// Enumerate resources.
    List,
    /// Create a resource.
    Create,
    /// Modify a resource.
    Update,
    /// Remove a resource.
    Delete,
    /// Stream changes to resources.
    Watch,
}

impl Verb {
    /// All verbs in declaration order.
    pub const ALL: [Self; 6] =
        [Self::Get, Self::List, Self::Create, Self::Update, Self::Delete, Self::Watch];

    /// Returns the lowercase RBAC verb string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Watch => "watch",
        }
    }

    /// Parses a lowercase RBAC verb string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == value)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tuples
// ============================================================================

/// Normalized description of what a call is attempting to do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationTuple {
    /// Namespace the call touches.
    pub namespace: String,
    /// Resource type being accessed.
    pub resource_type: ResourceType,
    /// Verb being performed.
    pub verb: Verb,
    /// Specific resource name, when the call targets one resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
}

impl AuthorizationTuple {
    /// Builds a namespace-scoped tuple with no resource name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, resource_type: ResourceType, verb: Verb) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type,
            verb,
            resource_name: None,
        }
    }

    /// Returns a copy scoped to a specific resource name.
    #[must_use]
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }
}

impl fmt::Display for AuthorizationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{} in {}", self.verb, self.resource_type, API_GROUP, self.namespace)?;
        if let Some(name) = &self.resource_name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Authority decision for a single `(identity, tuple)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the call is allowed.
    pub allowed: bool,
    /// Optional authority-supplied reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Decision {
    /// Builds an allow decision.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Builds a deny decision with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// Attaches a reason to the decision.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
