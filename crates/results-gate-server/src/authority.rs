// crates/results-gate-server/src/authority.rs
// ============================================================================
// Module: RBAC Authority
// Description: Authorization decision backends for the results gate.
// Purpose: Ask an RBAC authority whether an identity may act on a tuple.
// Dependencies: results-gate-config, results-gate-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! [`RbacAuthority`] is the seam between the gate and whatever decides
//! access. [`KubernetesAuthority`] submits a `SubjectAccessReview` to the
//! cluster API server; [`StaticRbacAuthority`] evaluates roles and bindings
//! from configuration for standalone deployments.
//!
//! Security posture: the authority is a trust boundary. An explicit "no" is
//! a [`Decision`]; anything that prevents a decision is an
//! [`AuthorityError`] and the gate fails closed on it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Certificate;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use results_gate_config::AuthorityMode;
use results_gate_config::KubernetesAuthorityConfig;
use results_gate_config::RBAC_WILDCARD;
use results_gate_config::RbacConfig;
use results_gate_config::ResultsGateConfig;
use results_gate_core::API_GROUP;
use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::Decision;
use results_gate_core::ResourceType;
use results_gate_core::Verb;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SubjectAccessReview` endpoint path.
pub const SUBJECT_ACCESS_REVIEW_PATH: &str =
    "/apis/authorization.k8s.io/v1/subjectaccessreviews";
/// Maximum accepted bearer token file size.
const MAX_TOKEN_FILE_BYTES: u64 = 64 * 1024;

// ============================================================================
// SECTION: Interface
// ============================================================================

/// RBAC decision interface.
#[async_trait]
pub trait RbacAuthority: Send + Sync {
    /// Decides whether `identity` may perform `tuple`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when no decision could be obtained.
    async fn authorize(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
    ) -> Result<Decision, AuthorityError>;

    /// Returns a short backend label for logs.
    fn label(&self) -> &'static str;
}

/// Builds the configured authority.
///
/// # Errors
///
/// Returns [`AuthorityError`] when the Kubernetes client cannot be built.
pub fn authority_from_config(
    config: &ResultsGateConfig,
) -> Result<Box<dyn RbacAuthority>, AuthorityError> {
    match config.authority.mode {
        AuthorityMode::Static => Ok(Box::new(StaticRbacAuthority::from_config(&config.rbac))),
        AuthorityMode::Kubernetes => {
            let kubernetes = config.authority.kubernetes.as_ref().ok_or_else(|| {
                AuthorityError::Invalid("authority.kubernetes is required".to_string())
            })?;
            Ok(Box::new(KubernetesAuthority::from_config(kubernetes)?))
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures that prevent an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The authority could not be reached or answered abnormally.
    #[error("authority unavailable: {0}")]
    Unavailable(String),
    /// The authority is misconfigured.
    #[error("authority invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Kubernetes
// ============================================================================

/// `SubjectAccessReview` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectAccessReview<'a> {
    /// API version.
    api_version: &'static str,
    /// Object kind.
    kind: &'static str,
    /// Review spec.
    spec: ReviewSpec<'a>,
}

/// Review spec naming the subject and the attempted access.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewSpec<'a> {
    /// Subject name.
    user: &'a str,
    /// Subject groups.
    #[serde(skip_serializing_if = "is_empty_set")]
    groups: &'a BTreeSet<String>,
    /// Subject extra attributes.
    #[serde(skip_serializing_if = "is_empty_map")]
    extra: &'a BTreeMap<String, Vec<String>>,
    /// Resource access being reviewed.
    resource_attributes: ResourceAttributes<'a>,
}

/// Resource attributes of a review.
#[derive(Debug, Serialize)]
struct ResourceAttributes<'a> {
    /// Namespace of the resource.
    namespace: &'a str,
    /// Verb attempted.
    verb: &'static str,
    /// API group.
    group: &'static str,
    /// Plural resource name.
    resource: &'static str,
    /// Specific resource name, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// `SubjectAccessReview` response body.
#[derive(Debug, Deserialize)]
struct ReviewResponse {
    /// Review status; absent status is treated as malformed.
    status: Option<ReviewStatus>,
}

/// Review status returned by the API server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewStatus {
    /// Whether access is allowed.
    #[serde(default)]
    allowed: bool,
    /// Whether access is explicitly denied.
    #[serde(default)]
    denied: bool,
    /// Authorizer-supplied reason.
    #[serde(default)]
    reason: Option<String>,
    /// Authorizer evaluation error.
    #[serde(default)]
    evaluation_error: Option<String>,
}

/// Source of the bearer token presented to the API server.
#[derive(Debug, Clone)]
enum TokenSource {
    /// No token is presented.
    None,
    /// Inline token.
    Inline(String),
    /// Token re-read from a file on every review so rotation is picked up.
    File(String),
}

/// Kubernetes `SubjectAccessReview` authority.
pub struct KubernetesAuthority {
    /// Review endpoint URL.
    review_url: String,
    /// Bearer token source.
    token: TokenSource,
    /// HTTP client configured with timeouts.
    client: Client,
    /// Attempts per review.
    max_attempts: u32,
    /// Delay between attempts.
    retry_backoff: Duration,
}

impl KubernetesAuthority {
    /// Builds an authority from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when the API server URL, CA bundle, or HTTP
    /// client is unusable.
    pub fn from_config(config: &KubernetesAuthorityConfig) -> Result<Self, AuthorityError> {
        let api_server = config
            .resolved_api_server()
            .map_err(|err| AuthorityError::Invalid(err.to_string()))?;
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if let Some(ca_path) = config.resolved_ca_path() {
            let pem = fs::read(ca_path).map_err(|err| {
                AuthorityError::Invalid(format!("failed to read ca bundle {ca_path}: {err}"))
            })?;
            let certificate = Certificate::from_pem(&pem)
                .map_err(|err| AuthorityError::Invalid(format!("invalid ca bundle: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder.build().map_err(|err| AuthorityError::Invalid(err.to_string()))?;
        let token = match (&config.token, config.resolved_token_path()) {
            (Some(token), _) => TokenSource::Inline(token.clone()),
            (None, Some(path)) => TokenSource::File(path.to_string()),
            (None, None) => TokenSource::None,
        };
        Ok(Self::with_client(api_server, token, client, config))
    }

    /// Builds an authority against an explicit base URL and optional token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when the HTTP client cannot be built.
    pub fn new(
        api_server: &str,
        token: Option<String>,
        config: &KubernetesAuthorityConfig,
    ) -> Result<Self, AuthorityError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| AuthorityError::Invalid(err.to_string()))?;
        let token = token.map_or(TokenSource::None, TokenSource::Inline);
        Ok(Self::with_client(api_server.to_string(), token, client, config))
    }

    /// Assembles the authority.
    fn with_client(
        api_server: String,
        token: TokenSource,
        client: Client,
        config: &KubernetesAuthorityConfig,
    ) -> Self {
        let base = api_server.trim_end_matches('/');
        Self {
            review_url: format!("{base}{SUBJECT_ACCESS_REVIEW_PATH}"),
            token,
            client,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Resolves the bearer header value for the next review.
    fn bearer_header(&self) -> Result<Option<HeaderValue>, AuthorityError> {
        let token = match &self.token {
            TokenSource::None => return Ok(None),
            TokenSource::Inline(token) => token.clone(),
            TokenSource::File(path) => read_token_file(path)?,
        };
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map(Some)
            .map_err(|_| AuthorityError::Invalid("invalid authority token".to_string()))
    }

    /// Sends one review and classifies the outcome.
    async fn review_once(
        &self,
        body: &SubjectAccessReview<'_>,
    ) -> Result<Decision, AttemptError> {
        let mut request = self.client.post(&self.review_url).json(body);
        if let Some(header) = self.bearer_header().map_err(AttemptError::Fatal)? {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }
        let response = request
            .send()
            .await
            .map_err(|err| AttemptError::Retryable(format!("review transport error: {err}")))?;
        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::Retryable(format!("review failed: status {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(AuthorityError::Unavailable(format!(
                "review rejected: status {status}"
            ))));
        }
        let review: ReviewResponse = response.json().await.map_err(|err| {
            AttemptError::Fatal(AuthorityError::Unavailable(format!(
                "malformed review response: {err}"
            )))
        })?;
        let status = review.status.ok_or_else(|| {
            AttemptError::Fatal(AuthorityError::Unavailable(
                "review response missing status".to_string(),
            ))
        })?;
        Ok(decision_from_status(status))
    }
}

#[async_trait]
impl RbacAuthority for KubernetesAuthority {
    async fn authorize(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
    ) -> Result<Decision, AuthorityError> {
        let body = SubjectAccessReview {
            api_version: "authorization.k8s.io/v1",
            kind: "SubjectAccessReview",
            spec: ReviewSpec {
                user: identity.subject(),
                groups: identity.groups(),
                extra: identity.extra(),
                resource_attributes: ResourceAttributes {
                    namespace: &tuple.namespace,
                    verb: tuple.verb.as_str(),
                    group: API_GROUP,
                    resource: tuple.resource_type.plural(),
                    name: tuple.resource_name.as_deref(),
                },
            },
        };
        let mut last_error = String::from("no review attempted");
        for attempt in 1 ..= self.max_attempts {
            match self.review_once(&body).await {
                Ok(decision) => return Ok(decision),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Retryable(message)) => {
                    last_error = message;
                    if attempt < self.max_attempts && !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }
        Err(AuthorityError::Unavailable(format!(
            "{last_error} after {} attempts",
            self.max_attempts
        )))
    }

    fn label(&self) -> &'static str {
        "kubernetes"
    }
}

/// Outcome of a single review attempt that produced no decision.
enum AttemptError {
    /// Worth retrying.
    Retryable(String),
    /// Not worth retrying.
    Fatal(AuthorityError),
}

/// Converts a review status into a decision.
fn decision_from_status(status: ReviewStatus) -> Decision {
    let reason = status
        .reason
        .filter(|reason| !reason.is_empty())
        .or(status.evaluation_error.filter(|err| !err.is_empty()));
    Decision {
        allowed: status.allowed && !status.denied,
        reason,
    }
}

/// Returns true when a borrowed set is empty.
#[allow(clippy::trivially_copy_pass_by_ref, reason = "Signature required by serde.")]
fn is_empty_set(set: &&BTreeSet<String>) -> bool {
    set.is_empty()
}

/// Returns true when a borrowed map is empty.
#[allow(clippy::trivially_copy_pass_by_ref, reason = "Signature required by serde.")]
fn is_empty_map(map: &&BTreeMap<String, Vec<String>>) -> bool {
    map.is_empty()
}

/// Reads and trims a bearer token file.
fn read_token_file(path: &str) -> Result<String, AuthorityError> {
    let metadata = fs::metadata(path)
        .map_err(|err| AuthorityError::Unavailable(format!("token file {path}: {err}")))?;
    if metadata.len() > MAX_TOKEN_FILE_BYTES {
        return Err(AuthorityError::Invalid(format!("token file {path} exceeds size limit")));
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AuthorityError::Unavailable(format!("token file {path}: {err}")))?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(AuthorityError::Unavailable(format!("token file {path} is empty")));
    }
    Ok(token.to_string())
}

// ============================================================================
// SECTION: Static RBAC
// ============================================================================

/// Compiled role rule; `None` sets match anything.
#[derive(Debug, Clone)]
struct CompiledRule {
    /// Matched resource types.
    resources: Option<BTreeSet<ResourceType>>,
    /// Matched verbs.
    verbs: Option<BTreeSet<Verb>>,
    /// Matched resource names; empty matches any.
    resource_names: BTreeSet<String>,
}

impl CompiledRule {
    /// Returns true when the rule grants the tuple.
    fn grants(&self, tuple: &AuthorizationTuple) -> bool {
        let resource_ok =
            self.resources.as_ref().is_none_or(|set| set.contains(&tuple.resource_type));
        let verb_ok = self.verbs.as_ref().is_none_or(|set| set.contains(&tuple.verb));
        let name_ok = self.resource_names.is_empty()
            || tuple.resource_name.as_ref().is_some_and(|name| self.resource_names.contains(name));
        resource_ok && verb_ok && name_ok
    }
}

/// Compiled role binding.
#[derive(Debug, Clone)]
struct CompiledBinding {
    /// Bound role name.
    role: String,
    /// Namespace scope; cluster-wide when absent.
    namespace: Option<String>,
    /// Bound subjects.
    users: BTreeSet<String>,
    /// Bound groups.
    groups: BTreeSet<String>,
}

impl CompiledBinding {
    /// Returns true when the binding applies to the identity in the namespace.
    fn applies(&self, identity: &CallIdentity, namespace: &str) -> bool {
        let in_scope = self.namespace.as_deref().is_none_or(|scope| scope == namespace);
        let bound = self.users.contains(identity.subject())
            || self.groups.iter().any(|group| identity.in_group(group));
        in_scope && bound
    }
}

/// Configuration-driven RBAC evaluator.
#[derive(Debug, Clone, Default)]
pub struct StaticRbacAuthority {
    /// Rules keyed by role name.
    roles: BTreeMap<String, Vec<CompiledRule>>,
    /// Bindings in configuration order.
    bindings: Vec<CompiledBinding>,
}

impl StaticRbacAuthority {
    /// Compiles roles and bindings; unknown resources and verbs were already
    /// rejected by config validation and are skipped here.
    #[must_use]
    pub fn from_config(config: &RbacConfig) -> Self {
        let roles = config
            .roles
            .iter()
            .map(|role| {
                let rules = role
                    .rules
                    .iter()
                    .map(|rule| CompiledRule {
                        resources: compile_set(&rule.resources, ResourceType::parse),
                        verbs: compile_set(&rule.verbs, Verb::parse),
                        resource_names: rule.resource_names.iter().cloned().collect(),
                    })
                    .collect();
                (role.name.clone(), rules)
            })
            .collect();
        let bindings = config
            .bindings
            .iter()
            .map(|binding| CompiledBinding {
                role: binding.role.clone(),
                namespace: binding.namespace.clone(),
                users: binding.users.iter().cloned().collect(),
                groups: binding.groups.iter().cloned().collect(),
            })
            .collect();
        Self {
            roles,
            bindings,
        }
    }

    /// Evaluates a tuple synchronously.
    #[must_use]
    pub fn evaluate(&self, identity: &CallIdentity, tuple: &AuthorizationTuple) -> Decision {
        for binding in &self.bindings {
            if !binding.applies(identity, &tuple.namespace) {
                continue;
            }
            let Some(rules) = self.roles.get(&binding.role) else {
                continue;
            };
            if rules.iter().any(|rule| rule.grants(tuple)) {
                return Decision::allow().with_reason(format!("granted by role {}", binding.role));
            }
        }
        Decision::deny("no role binding grants access")
    }
}

#[async_trait]
impl RbacAuthority for StaticRbacAuthority {
    async fn authorize(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
    ) -> Result<Decision, AuthorityError> {
        Ok(self.evaluate(identity, tuple))
    }

    fn label(&self) -> &'static str {
        "static"
    }
}

/// Compiles a wildcard-aware value list; `None` means "any".
fn compile_set<T: Ord>(
    values: &[String],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<BTreeSet<T>> {
    if values.iter().any(|value| value == RBAC_WILDCARD) {
        return None;
    }
    Some(values.iter().filter_map(|value| parse(value)).collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
