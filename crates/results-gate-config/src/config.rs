// crates/results-gate-config/src/config.rs
// ============================================================================
// Module: Results Gate Configuration
// Description: Configuration loading and validation for the results gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: results-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a gate that cannot be
//! configured correctly never starts.
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use results_gate_core::ResourcePath;
use results_gate_core::ResourceType;
use results_gate_core::Verb;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "results-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "RESULTS_GATE_CONFIG";
/// Environment variable that overrides the listener port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default listener address.
const DEFAULT_BIND: &str = "127.0.0.1:50051";
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Hard cap on request body size.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Maximum static tokens, mTLS subjects, or principal mappings.
pub(crate) const MAX_AUTH_TOKENS: usize = 1024;
/// Maximum static token length.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 4096;
/// Maximum subject or group name length.
pub(crate) const MAX_AUTH_SUBJECT_LENGTH: usize = 512;
/// Maximum groups per token or principal.
const MAX_GROUPS_PER_SUBJECT: usize = 64;
/// Maximum clock-skew leeway for bearer claims.
const MAX_LEEWAY_SECS: u64 = 3600;
/// Default clock-skew leeway for bearer claims.
const DEFAULT_LEEWAY_SECS: u64 = 60;
/// Standard in-cluster service-account token path.
pub const IN_CLUSTER_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
/// Standard in-cluster cluster CA path.
pub const IN_CLUSTER_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
/// Environment variable naming the in-cluster API server host.
const SERVICE_HOST_ENV_VAR: &str = "KUBERNETES_SERVICE_HOST";
/// Environment variable naming the in-cluster API server port.
const SERVICE_PORT_ENV_VAR: &str = "KUBERNETES_SERVICE_PORT";
/// Minimum authority connect timeout.
pub(crate) const MIN_AUTHORITY_CONNECT_TIMEOUT_MS: u64 = 50;
/// Maximum authority connect timeout.
pub(crate) const MAX_AUTHORITY_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default authority connect timeout.
const DEFAULT_AUTHORITY_CONNECT_TIMEOUT_MS: u64 = 500;
/// Minimum per-attempt authority request timeout.
pub(crate) const MIN_AUTHORITY_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum per-attempt authority request timeout.
pub(crate) const MAX_AUTHORITY_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default per-attempt authority request timeout.
const DEFAULT_AUTHORITY_REQUEST_TIMEOUT_MS: u64 = 2_000;
/// Maximum authority attempts per check.
const MAX_AUTHORITY_ATTEMPTS: u32 = 5;
/// Default authority attempts per check.
const DEFAULT_AUTHORITY_ATTEMPTS: u32 = 3;
/// Maximum backoff between authority attempts.
const MAX_RETRY_BACKOFF_MS: u64 = 5_000;
/// Default backoff between authority attempts.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
/// Minimum per-call gate timeout.
pub(crate) const MIN_CALL_TIMEOUT_MS: u64 = 10;
/// Maximum per-call gate timeout.
pub(crate) const MAX_CALL_TIMEOUT_MS: u64 = 60_000;
/// Default per-call gate timeout.
const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;
/// Maximum decision cache TTL.
const MAX_CACHE_TTL_MS: u64 = 300_000;
/// Default allow TTL.
const DEFAULT_ALLOW_TTL_MS: u64 = 5_000;
/// Default deny TTL.
const DEFAULT_DENY_TTL_MS: u64 = 1_000;
/// Maximum decision cache entries.
const MAX_CACHE_ENTRIES: usize = 1_000_000;
/// Default decision cache entries.
const DEFAULT_CACHE_ENTRIES: usize = 10_000;
/// Maximum RBAC roles, bindings, or rules per role.
const MAX_RBAC_ENTRIES: usize = 1024;
/// Wildcard accepted in RBAC rules.
pub const RBAC_WILDCARD: &str = "*";

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Results gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsGateConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity extraction configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// RBAC authority configuration.
    #[serde(default)]
    pub authority: AuthorityConfig,
    /// Gate timeout and cache configuration.
    #[serde(default)]
    pub gate: GateConfig,
    /// In-process RBAC rules for the static authority.
    #[serde(default)]
    pub rbac: RbacConfig,
}

impl ResultsGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.authority.validate()?;
        self.gate.validate()?;
        self.rbac.validate()?;
        if self.authority.mode == AuthorityMode::Kubernetes && !self.rbac.is_empty() {
            return Err(ConfigError::Invalid(
                "rbac roles and bindings only allowed when authority.mode=static".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (`host:port`).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Optional TLS configuration.
    #[serde(default)]
    pub tls: Option<ServerTlsConfig>,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            tls: None,
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid("max_body_bytes exceeds hard limit".to_string()));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        self.audit.validate()
    }

    /// Returns the listener address, honoring the `PORT` environment override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address or port override is invalid.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let port = env::var(PORT_ENV_VAR).ok();
        apply_port_override(&self.bind, port.as_deref())
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTlsConfig {
    /// Server certificate chain (PEM).
    pub cert_path: String,
    /// Server private key (PEM).
    pub key_path: String,
}

impl ServerTlsConfig {
    /// Validates TLS configuration paths.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("tls.cert_path", &self.cert_path)?;
        validate_path_string("tls.key_path", &self.key_path)?;
        Ok(())
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when absent.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Identity extraction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Read claims from an upstream-verified bearer JWT.
    #[default]
    BearerClaims,
    /// Map opaque bearer tokens to identities.
    StaticTokens,
    /// Trust the client subject asserted by a TLS proxy.
    MtlsSubject,
}

impl AuthMode {
    /// Returns the config label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BearerClaims => "bearer_claims",
            Self::StaticTokens => "static_tokens",
            Self::MtlsSubject => "mtls_subject",
        }
    }
}

/// Identity extraction configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Extraction mode.
    #[serde(default)]
    pub mode: AuthMode,
    /// Clock-skew leeway applied to `exp` claims and token expiry.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    /// Static token table (required for `static_tokens`).
    #[serde(default)]
    pub tokens: Vec<StaticTokenConfig>,
    /// Allowed mTLS subjects (required for `mtls_subject`).
    #[serde(default)]
    pub mtls_subjects: Vec<String>,
    /// Group mappings for mTLS subjects.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            leeway_secs: default_leeway_secs(),
            tokens: Vec::new(),
            mtls_subjects: Vec::new(),
            principals: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Validates identity extraction configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.leeway_secs > MAX_LEEWAY_SECS {
            return Err(ConfigError::Invalid("auth.leeway_secs exceeds max".to_string()));
        }
        if self.tokens.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("too many auth tokens".to_string()));
        }
        let mut seen = BTreeSet::new();
        for token in &self.tokens {
            token.validate()?;
            if !seen.insert(token.token.as_str()) {
                return Err(ConfigError::Invalid("duplicate auth token".to_string()));
            }
        }
        if self.mtls_subjects.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("too many mTLS subjects".to_string()));
        }
        for subject in &self.mtls_subjects {
            validate_subject("auth.mtls_subjects", subject)?;
        }
        if self.principals.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("too many principal mappings".to_string()));
        }
        for principal in &self.principals {
            principal.validate()?;
        }
        match self.mode {
            AuthMode::StaticTokens if self.tokens.is_empty() => Err(ConfigError::Invalid(
                "static_tokens auth requires auth.tokens".to_string(),
            )),
            AuthMode::MtlsSubject if self.mtls_subjects.is_empty() => Err(ConfigError::Invalid(
                "mtls_subject auth requires auth.mtls_subjects".to_string(),
            )),
            AuthMode::BearerClaims | AuthMode::StaticTokens | AuthMode::MtlsSubject => Ok(()),
        }
    }
}

/// Static token mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticTokenConfig {
    /// Opaque bearer token.
    pub token: String,
    /// Subject the token authenticates as.
    pub subject: String,
    /// Groups the subject belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Optional expiry (unix seconds).
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl StaticTokenConfig {
    /// Validates a token mapping.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid("auth token must be non-empty".to_string()));
        }
        if self.token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid("auth token too long".to_string()));
        }
        if self.token.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid("auth token must not contain whitespace".to_string()));
        }
        validate_subject("auth.tokens.subject", &self.subject)?;
        validate_groups("auth.tokens.groups", &self.groups)
    }
}

/// Group mapping for an mTLS subject.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    /// Certificate subject.
    pub subject: String,
    /// Groups the subject belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl PrincipalConfig {
    /// Validates principal configuration constraints.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_subject("auth.principals.subject", &self.subject)?;
        validate_groups("auth.principals.groups", &self.groups)
    }
}

// ============================================================================
// SECTION: Authority
// ============================================================================

/// RBAC authority selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityMode {
    /// Evaluate `[rbac]` rules in process.
    #[default]
    Static,
    /// Query the Kubernetes `SubjectAccessReview` API.
    Kubernetes,
}

impl AuthorityMode {
    /// Returns the config label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Kubernetes => "kubernetes",
        }
    }
}

/// RBAC authority configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorityConfig {
    /// Authority mode selection.
    #[serde(default)]
    pub mode: AuthorityMode,
    /// Kubernetes authority settings.
    #[serde(default)]
    pub kubernetes: Option<KubernetesAuthorityConfig>,
}

impl AuthorityConfig {
    /// Validates authority configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            AuthorityMode::Static => {
                if self.kubernetes.is_some() {
                    return Err(ConfigError::Invalid(
                        "authority.kubernetes only allowed when authority.mode=kubernetes"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            AuthorityMode::Kubernetes => {
                let Some(kubernetes) = &self.kubernetes else {
                    return Err(ConfigError::Invalid(
                        "authority.mode=kubernetes requires authority.kubernetes".to_string(),
                    ));
                };
                kubernetes.validate()
            }
        }
    }
}

/// Kubernetes `SubjectAccessReview` authority configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesAuthorityConfig {
    /// API server base URL; derived from the environment when `in_cluster`.
    #[serde(default)]
    pub api_server: Option<String>,
    /// Use the pod's service-account credentials and cluster CA.
    #[serde(default)]
    pub in_cluster: bool,
    /// Inline bearer token for the gate's own identity.
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a bearer token file.
    #[serde(default)]
    pub token_path: Option<String>,
    /// Path to a PEM CA bundle for the API server.
    #[serde(default)]
    pub ca_path: Option<String>,
    /// Allow `http://` API server URLs (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_authority_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-attempt request timeout in milliseconds.
    #[serde(default = "default_authority_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum attempts per check (including the first).
    #[serde(default = "default_authority_attempts")]
    pub max_attempts: u32,
    /// Fixed backoff between attempts in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl KubernetesAuthorityConfig {
    /// Validates Kubernetes authority configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.api_server, self.in_cluster) {
            (None, false) => {
                return Err(ConfigError::Invalid(
                    "authority.kubernetes requires api_server or in_cluster".to_string(),
                ));
            }
            (Some(url), _) => {
                validate_url("authority.kubernetes.api_server", url, self.allow_http)?;
            }
            (None, true) => {}
        }
        if self.token.is_some() && self.token_path.is_some() {
            return Err(ConfigError::Invalid(
                "authority.kubernetes.token and token_path are mutually exclusive".to_string(),
            ));
        }
        if let Some(token) = &self.token
            && (token.trim().is_empty() || token.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::Invalid(
                "authority.kubernetes.token must be non-empty without whitespace".to_string(),
            ));
        }
        if let Some(path) = &self.token_path {
            validate_path_string("authority.kubernetes.token_path", path)?;
        }
        if let Some(path) = &self.ca_path {
            validate_path_string("authority.kubernetes.ca_path", path)?;
        }
        validate_timeout_range(
            "authority.kubernetes.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_AUTHORITY_CONNECT_TIMEOUT_MS,
            MAX_AUTHORITY_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "authority.kubernetes.request_timeout_ms",
            self.request_timeout_ms,
            MIN_AUTHORITY_REQUEST_TIMEOUT_MS,
            MAX_AUTHORITY_REQUEST_TIMEOUT_MS,
        )?;
        if self.max_attempts == 0 || self.max_attempts > MAX_AUTHORITY_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "authority.kubernetes.max_attempts must be between 1 and {MAX_AUTHORITY_ATTEMPTS}"
            )));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(
                "authority.kubernetes.retry_backoff_ms exceeds max".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the API server base URL, consulting the in-cluster environment
    /// when no explicit URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no API server can be determined.
    pub fn resolved_api_server(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.api_server {
            return Ok(url.trim().trim_end_matches('/').to_string());
        }
        in_cluster_api_server(
            env::var(SERVICE_HOST_ENV_VAR).ok().as_deref(),
            env::var(SERVICE_PORT_ENV_VAR).ok().as_deref(),
        )
    }

    /// Returns the token file path, falling back to the in-cluster mount.
    #[must_use]
    pub fn resolved_token_path(&self) -> Option<&str> {
        if self.token.is_some() {
            return None;
        }
        self.token_path.as_deref().or(self.in_cluster.then_some(IN_CLUSTER_TOKEN_PATH))
    }

    /// Returns the CA bundle path, falling back to the in-cluster mount.
    #[must_use]
    pub fn resolved_ca_path(&self) -> Option<&str> {
        self.ca_path.as_deref().or(self.in_cluster.then_some(IN_CLUSTER_CA_PATH))
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Gate timeout and cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Upper bound on the whole authority check per call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Decision cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            cache: CacheConfig::default(),
        }
    }
}

impl GateConfig {
    /// Validates gate configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "gate.call_timeout_ms",
            self.call_timeout_ms,
            MIN_CALL_TIMEOUT_MS,
            MAX_CALL_TIMEOUT_MS,
        )?;
        self.cache.validate()
    }
}

/// Decision cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enable the decision cache.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Lifetime of cached allow decisions.
    #[serde(default = "default_allow_ttl_ms")]
    pub allow_ttl_ms: u64,
    /// Lifetime of cached deny decisions; zero disables deny caching.
    #[serde(default = "default_deny_ttl_ms")]
    pub deny_ttl_ms: u64,
    /// Maximum cached entries.
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            allow_ttl_ms: default_allow_ttl_ms(),
            deny_ttl_ms: default_deny_ttl_ms(),
            max_entries: default_cache_entries(),
        }
    }
}

impl CacheConfig {
    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        validate_timeout_range("gate.cache.allow_ttl_ms", self.allow_ttl_ms, 1, MAX_CACHE_TTL_MS)?;
        validate_timeout_range("gate.cache.deny_ttl_ms", self.deny_ttl_ms, 0, MAX_CACHE_TTL_MS)?;
        if self.max_entries == 0 || self.max_entries > MAX_CACHE_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "gate.cache.max_entries must be between 1 and {MAX_CACHE_ENTRIES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: RBAC
// ============================================================================

/// In-process RBAC rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RbacConfig {
    /// Role definitions.
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
    /// Role bindings.
    #[serde(default)]
    pub bindings: Vec<RoleBindingConfig>,
}

impl RbacConfig {
    /// Returns true when no roles or bindings are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.bindings.is_empty()
    }

    /// Validates RBAC configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.roles.len() > MAX_RBAC_ENTRIES || self.bindings.len() > MAX_RBAC_ENTRIES {
            return Err(ConfigError::Invalid("rbac exceeds max entries".to_string()));
        }
        let mut names = BTreeSet::new();
        for role in &self.roles {
            role.validate()?;
            if !names.insert(role.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate rbac role: {}", role.name)));
            }
        }
        for binding in &self.bindings {
            binding.validate()?;
            if !names.contains(binding.role.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "rbac binding references unknown role: {}",
                    binding.role
                )));
            }
        }
        Ok(())
    }
}

/// Named set of rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Role name.
    pub name: String,
    /// Rules granted by the role.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RoleConfig {
    /// Validates a role definition.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("rbac.roles.name must be non-empty".to_string()));
        }
        if self.rules.len() > MAX_RBAC_ENTRIES {
            return Err(ConfigError::Invalid("rbac.roles.rules exceeds max entries".to_string()));
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

/// Kubernetes-shaped policy rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Resources (`results`, `records`, or `*`).
    pub resources: Vec<String>,
    /// Verbs (`get`, `list`, `create`, `update`, `delete`, `watch`, or `*`).
    pub verbs: Vec<String>,
    /// Optional resource-name restriction; empty matches any name.
    #[serde(default)]
    pub resource_names: Vec<String>,
}

impl RuleConfig {
    /// Validates a rule.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.resources.is_empty() || self.verbs.is_empty() {
            return Err(ConfigError::Invalid(
                "rbac rules require resources and verbs".to_string(),
            ));
        }
        for resource in &self.resources {
            if resource != RBAC_WILDCARD && ResourceType::parse(resource).is_none() {
                return Err(ConfigError::Invalid(format!("unknown rbac resource: {resource}")));
            }
        }
        for verb in &self.verbs {
            if verb != RBAC_WILDCARD && Verb::parse(verb).is_none() {
                return Err(ConfigError::Invalid(format!("unknown rbac verb: {verb}")));
            }
        }
        if self.resource_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "rbac resource_names entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Binding of a role to users and groups.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleBindingConfig {
    /// Bound role name.
    pub role: String,
    /// Namespace scope; cluster-wide when absent.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Bound user subjects.
    #[serde(default)]
    pub users: Vec<String>,
    /// Bound groups.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl RoleBindingConfig {
    /// Validates a binding.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.users.is_empty() && self.groups.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "rbac binding for role {} has no users or groups",
                self.role
            )));
        }
        if let Some(namespace) = &self.namespace {
            match ResourcePath::parse(namespace) {
                Ok(ResourcePath::Namespace {
                    ..
                }) => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "rbac binding namespace is invalid: {namespace}"
                    )));
                }
            }
        }
        for user in &self.users {
            validate_subject("rbac.bindings.users", user)?;
        }
        validate_groups("rbac.bindings.groups", &self.groups)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an HTTP(S) URL field.
fn validate_url(field: &str, value: &str, allow_http: bool) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
        return Err(ConfigError::Invalid(format!("{field} must include http:// or https://")));
    }
    if trimmed.starts_with("http://") && !allow_http {
        return Err(ConfigError::Invalid(format!("{field} uses http:// without allow_http")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Validates a subject name.
fn validate_subject(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_AUTH_SUBJECT_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} too long")));
    }
    Ok(())
}

/// Validates a list of group names.
fn validate_groups(field: &str, groups: &[String]) -> Result<(), ConfigError> {
    if groups.len() > MAX_GROUPS_PER_SUBJECT {
        return Err(ConfigError::Invalid(format!("{field} exceeds max entries")));
    }
    for group in groups {
        validate_subject(field, group)?;
    }
    Ok(())
}

/// Validates a millisecond value against inclusive bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Applies a port override to a bind address.
///
/// # Errors
///
/// Returns [`ConfigError`] when the address or port cannot be parsed.
pub fn apply_port_override(bind: &str, port: Option<&str>) -> Result<SocketAddr, ConfigError> {
    let mut addr: SocketAddr = bind
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))?;
    if let Some(port) = port.map(str::trim).filter(|port| !port.is_empty()) {
        let port: u16 = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid {PORT_ENV_VAR} value: {port}")))?;
        addr.set_port(port);
    }
    Ok(addr)
}

/// Builds the in-cluster API server URL from service environment values.
///
/// # Errors
///
/// Returns [`ConfigError`] when the host is missing.
pub fn in_cluster_api_server(
    host: Option<&str>,
    port: Option<&str>,
) -> Result<String, ConfigError> {
    let host = host.map(str::trim).filter(|host| !host.is_empty()).ok_or_else(|| {
        ConfigError::Invalid(format!("in_cluster requires {SERVICE_HOST_ENV_VAR}"))
    })?;
    let port = port.map(str::trim).filter(|port| !port.is_empty()).unwrap_or("443");
    if host.contains(':') {
        Ok(format!("https://[{host}]:{port}"))
    } else {
        Ok(format!("https://{host}:{port}"))
    }
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Default bearer-claims leeway.
const fn default_leeway_secs() -> u64 {
    DEFAULT_LEEWAY_SECS
}

/// Default authority connect timeout.
const fn default_authority_connect_timeout_ms() -> u64 {
    DEFAULT_AUTHORITY_CONNECT_TIMEOUT_MS
}

/// Default authority request timeout.
const fn default_authority_request_timeout_ms() -> u64 {
    DEFAULT_AUTHORITY_REQUEST_TIMEOUT_MS
}

/// Default authority attempts.
const fn default_authority_attempts() -> u32 {
    DEFAULT_AUTHORITY_ATTEMPTS
}

/// Default retry backoff.
const fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Default per-call gate timeout.
const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

/// Cache is on unless disabled.
const fn default_cache_enabled() -> bool {
    true
}

/// Default allow TTL.
const fn default_allow_ttl_ms() -> u64 {
    DEFAULT_ALLOW_TTL_MS
}

/// Default deny TTL.
const fn default_deny_ttl_ms() -> u64 {
    DEFAULT_DENY_TTL_MS
}

/// Default cache capacity.
const fn default_cache_entries() -> usize {
    DEFAULT_CACHE_ENTRIES
}

// ============================================================================
// SECTION: Tests
// ============================================================================
