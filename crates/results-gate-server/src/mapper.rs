// crates/results-gate-server/src/mapper.rs
// ============================================================================
// Module: Resource Mapper
// Description: Map results methods and payloads to authorization tuples.
// Purpose: Derive `(namespace, resource, verb, name)` deterministically per call.
// Dependencies: results-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every protected method is registered with a [`MethodRule`]: a static
//! resource type and verb, plus the payload field that scopes the call and
//! the resource-name shape that field must have. Mapping is pure and
//! side-effect-free.
//!
//! ## Invariants
//! - Methods without a rule fail closed with [`MappingError::UnmappedMethod`].
//! - A registered method whose scope field is absent or malformed fails with
//!   [`MappingError::InvalidRequest`] and is never authorized.
//! - A method is registered at most once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use results_gate_core::AuthorizationTuple;
use results_gate_core::ResourcePath;
use results_gate_core::ResourceType;
use results_gate_core::ResultsMethod;
use results_gate_core::Verb;
use results_gate_core::normalize_method_name;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Payload field that carries the call's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeField {
    /// The `parent` field (create and list calls).
    Parent,
    /// The `name` field (single-resource calls).
    Name,
}

impl ScopeField {
    /// Returns the JSON field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Name => "name",
        }
    }
}

/// Resource-name shape the scope field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeShape {
    /// `<namespace>`.
    Namespace,
    /// `<namespace>/results/<result>`.
    Result,
    /// `<namespace>/results/<result>` where `<result>` may be `-`.
    ResultOrWildcard,
    /// `<namespace>/results/<result>/records/<record>`.
    Record,
}

impl ScopeShape {
    /// Returns the shape label.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Result => "result",
            Self::ResultOrWildcard => "result_or_wildcard",
            Self::Record => "record",
        }
    }

    /// Returns true when the parsed path has this shape.
    fn matches(self, path: &ResourcePath) -> bool {
        match (self, path) {
            (Self::Namespace, ResourcePath::Namespace { .. })
            | (Self::ResultOrWildcard, ResourcePath::Result { .. })
            | (Self::Record, ResourcePath::Record { .. }) => true,
            (Self::Result, ResourcePath::Result { .. }) => !path.is_wildcard(),
            _ => false,
        }
    }
}

/// Static authorization rule for one method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRule {
    /// Short method name.
    pub method: String,
    /// Resource type touched by the method.
    pub resource_type: ResourceType,
    /// Verb performed by the method.
    pub verb: Verb,
    /// Payload field that scopes the call.
    pub scope_field: ScopeField,
    /// Required shape of the scope field.
    pub scope_shape: ScopeShape,
    /// Whether the tuple carries the addressed resource's identifier.
    pub named: bool,
}

impl MethodRule {
    /// Builds a rule.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        resource_type: ResourceType,
        verb: Verb,
        scope_field: ScopeField,
        scope_shape: ScopeShape,
    ) -> Self {
        Self {
            method: method.into(),
            resource_type,
            verb,
            scope_field,
            scope_shape,
            named: scope_field == ScopeField::Name,
        }
    }

    /// Returns the default rule for a results method.
    #[must_use]
    pub fn for_results_method(method: ResultsMethod) -> Self {
        use ResourceType::Record;
        use ResourceType::Result;
        let (resource_type, verb, field, shape) = match method {
            ResultsMethod::CreateResult => {
                (Result, Verb::Create, ScopeField::Parent, ScopeShape::Namespace)
            }
            ResultsMethod::GetResult => (Result, Verb::Get, ScopeField::Name, ScopeShape::Result),
            ResultsMethod::UpdateResult => {
                (Result, Verb::Update, ScopeField::Name, ScopeShape::Result)
            }
            ResultsMethod::DeleteResult => {
                (Result, Verb::Delete, ScopeField::Name, ScopeShape::Result)
            }
            ResultsMethod::ListResults => {
                (Result, Verb::List, ScopeField::Parent, ScopeShape::Namespace)
            }
            ResultsMethod::CreateRecord => {
                (Record, Verb::Create, ScopeField::Parent, ScopeShape::Result)
            }
            ResultsMethod::GetRecord => (Record, Verb::Get, ScopeField::Name, ScopeShape::Record),
            ResultsMethod::UpdateRecord => {
                (Record, Verb::Update, ScopeField::Name, ScopeShape::Record)
            }
            ResultsMethod::DeleteRecord => {
                (Record, Verb::Delete, ScopeField::Name, ScopeShape::Record)
            }
            ResultsMethod::ListRecords => {
                (Record, Verb::List, ScopeField::Parent, ScopeShape::ResultOrWildcard)
            }
        };
        Self::new(method.short_name(), resource_type, verb, field, shape)
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Method name to rule table.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    /// Rules keyed by short method name.
    rules: BTreeMap<String, MethodRule>,
}

impl MethodRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry covering every results method.
    #[must_use]
    pub fn results_defaults() -> Self {
        let rules = ResultsMethod::ALL
            .into_iter()
            .map(|method| (method.short_name().to_string(), MethodRule::for_results_method(method)))
            .collect();
        Self {
            rules,
        }
    }

    /// Registers a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the method name is invalid or already
    /// registered.
    pub fn register(&mut self, mut rule: MethodRule) -> Result<(), RegistryError> {
        let short = normalize_method_name(&rule.method)
            .ok_or_else(|| RegistryError::InvalidMethod(rule.method.clone()))?
            .to_string();
        if self.rules.contains_key(&short) {
            return Err(RegistryError::Duplicate(short));
        }
        rule.method.clone_from(&short);
        self.rules.insert(short, rule);
        Ok(())
    }

    /// Returns the rule for a method, accepting full or short names.
    #[must_use]
    pub fn rule(&self, method: &str) -> Option<&MethodRule> {
        normalize_method_name(method).and_then(|short| self.rules.get(short))
    }

    /// Returns every rule in method-name order.
    pub fn rules(&self) -> impl Iterator<Item = &MethodRule> {
        self.rules.values()
    }

    /// Returns the number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ensures every exposed method has a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingRules`] listing uncovered methods.
    pub fn ensure_covers<'a, I>(&self, methods: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let missing: Vec<String> = methods
            .into_iter()
            .filter(|method| self.rule(method).is_none())
            .map(ToString::to_string)
            .collect();
        if missing.is_empty() { Ok(()) } else { Err(RegistryError::MissingRules(missing)) }
    }

    /// Maps a method call to its authorization tuple.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError`] when the method is unmapped or the payload
    /// does not carry a valid scope.
    pub fn map(&self, method: &str, payload: &Value) -> Result<AuthorizationTuple, MappingError> {
        let rule =
            self.rule(method).ok_or_else(|| MappingError::UnmappedMethod(method.to_string()))?;
        let field = rule.scope_field.as_str();
        let raw = payload
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| MappingError::InvalidRequest(format!("missing string field {field}")))?;
        let path = ResourcePath::parse(raw)
            .map_err(|err| MappingError::InvalidRequest(format!("{field}: {err}")))?;
        if !rule.scope_shape.matches(&path) {
            return Err(MappingError::InvalidRequest(format!(
                "{field} does not address a {} name",
                rule.scope_shape.as_str()
            )));
        }
        let tuple = AuthorizationTuple::new(path.namespace(), rule.resource_type, rule.verb);
        match path.leaf_id() {
            Some(leaf) if rule.named => Ok(tuple.with_resource_name(leaf)),
            _ => Ok(tuple),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-call mapping failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The method has no registered rule.
    #[error("unmapped method: {0}")]
    UnmappedMethod(String),
    /// The payload does not carry a valid scope.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Registry construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A method was registered twice.
    #[error("method registered twice: {0}")]
    Duplicate(String),
    /// The method name is not a results method identifier.
    #[error("invalid method name: {0}")]
    InvalidMethod(String),
    /// Exposed methods have no rule.
    #[error("methods without authorization rules: {}", .0.join(", "))]
    MissingRules(Vec<String>),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
