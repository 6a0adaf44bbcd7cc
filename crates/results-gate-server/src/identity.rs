// crates/results-gate-server/src/identity.rs
// ============================================================================
// Module: Identity Extraction
// Description: Derive caller identities from transport call metadata.
// Purpose: Provide strict, fail-closed credential parsing for every call.
// Dependencies: results-gate-config, results-gate-core, base64, serde, sha2
// ============================================================================

//! ## Overview
//! Identity extractors turn per-call transport metadata into a
//! [`CallIdentity`]. Credentials have already been verified by the transport
//! layer upstream; extraction only parses them and checks expiry, so it
//! performs no network I/O.
//!
//! Three extractors are provided:
//! - [`BearerClaimsExtractor`] reads `sub`, `groups`, `exp`, and `nbf` from a
//!   JWT; other string claims become extra attributes for the authority.
//! - [`StaticTokenExtractor`] maps opaque tokens through configuration.
//! - [`MtlsSubjectExtractor`] trusts a client subject asserted by a TLS proxy.
//!
//! Security posture: metadata is untrusted. Raw tokens never leave this
//! module; only their SHA-256 fingerprints are recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use results_gate_config::AuthConfig;
use results_gate_config::AuthMode;
use results_gate_config::PrincipalConfig;
use results_gate_config::StaticTokenConfig;
use results_gate_core::CallIdentity;
use results_gate_core::CredentialKind;
use serde::Deserialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the client certificate subject from a trusted TLS proxy.
pub const CLIENT_SUBJECT_HEADER: &str = "x-results-gate-client-subject";
/// Maximum accepted credential header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Subject prefix for Kubernetes service accounts.
const SERVICE_ACCOUNT_PREFIX: &str = "system:serviceaccount:";
/// Group shared by every service account.
const SERVICE_ACCOUNTS_GROUP: &str = "system:serviceaccounts";
/// Group shared by every authenticated principal.
const AUTHENTICATED_GROUP: &str = "system:authenticated";
/// Registered JWT claims that never become extra attributes.
const REGISTERED_CLAIMS: [&str; 4] = ["iss", "aud", "iat", "jti"];
/// Maximum extra attributes taken from one token.
const MAX_EXTRA_CLAIMS: usize = 32;
/// Maximum values per extra attribute.
const MAX_EXTRA_VALUES: usize = 64;

// ============================================================================
// SECTION: Call Metadata
// ============================================================================

/// Transport-level metadata for a single call.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    /// Authorization header value.
    pub auth_header: Option<String>,
    /// Client subject asserted by a trusted TLS proxy.
    pub client_subject: Option<String>,
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// Request identifier for auditing.
    pub request_id: Option<String>,
}

impl CallMetadata {
    /// Builds empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the authorization header set.
    #[must_use]
    pub fn with_auth_header(mut self, value: impl Into<String>) -> Self {
        self.auth_header = Some(value.into());
        self
    }

    /// Returns a copy with a `Bearer` authorization header.
    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_auth_header(format!("Bearer {token}"))
    }

    /// Returns a copy with the asserted client subject set.
    #[must_use]
    pub fn with_client_subject(mut self, subject: impl Into<String>) -> Self {
        self.client_subject = Some(subject.into());
        self
    }

    /// Returns a copy with the peer address set.
    #[must_use]
    pub const fn with_peer_ip(mut self, peer_ip: IpAddr) -> Self {
        self.peer_ip = Some(peer_ip);
        self
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity extraction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// No credential was presented.
    #[error("missing credential: {0}")]
    Missing(String),
    /// The credential could not be parsed.
    #[error("malformed credential: {0}")]
    Malformed(String),
    /// The credential has expired.
    #[error("credential expired")]
    Expired,
    /// The credential is not valid until `not_before` (unix seconds).
    #[error("credential not valid before {not_before}")]
    NotYetValid {
        /// The credential's `nbf` claim.
        not_before: u64,
    },
    /// The credential is well-formed but not accepted.
    #[error("credential rejected: {0}")]
    Rejected(String),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Derives a [`CallIdentity`] from call metadata.
pub trait IdentityExtractor: Send + Sync {
    /// Extracts the caller identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when no acceptable credential is present.
    fn extract(&self, metadata: &CallMetadata) -> Result<CallIdentity, AuthenticationError>;

    /// Returns the extraction mode.
    fn mode(&self) -> AuthMode;
}

/// Builds the configured extractor.
#[must_use]
pub fn extractor_from_config(config: &AuthConfig) -> Box<dyn IdentityExtractor> {
    match config.mode {
        AuthMode::BearerClaims => Box::new(BearerClaimsExtractor::new(config.leeway_secs)),
        AuthMode::StaticTokens => {
            Box::new(StaticTokenExtractor::new(&config.tokens, config.leeway_secs))
        }
        AuthMode::MtlsSubject => {
            Box::new(MtlsSubjectExtractor::new(&config.mtls_subjects, &config.principals))
        }
    }
}

// ============================================================================
// SECTION: Bearer Claims
// ============================================================================

/// JWT claims read by [`BearerClaimsExtractor`].
#[derive(Debug, Deserialize)]
struct BearerClaims {
    /// Subject.
    #[serde(default)]
    sub: Option<String>,
    /// Group memberships.
    #[serde(default)]
    groups: Vec<String>,
    /// Expiry (unix seconds).
    #[serde(default)]
    exp: Option<u64>,
    /// Not-before time (unix seconds).
    #[serde(default)]
    nbf: Option<u64>,
    /// Remaining claims.
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// Reads identity claims from an upstream-verified bearer JWT.
#[derive(Debug, Clone)]
pub struct BearerClaimsExtractor {
    /// Clock-skew leeway applied to `exp` and `nbf`.
    leeway_secs: u64,
}

impl BearerClaimsExtractor {
    /// Builds a claims extractor.
    #[must_use]
    pub const fn new(leeway_secs: u64) -> Self {
        Self {
            leeway_secs,
        }
    }

    /// Extracts the identity as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the token is absent, malformed,
    /// expired, or not yet valid.
    pub fn extract_at(
        &self,
        metadata: &CallMetadata,
        now: u64,
    ) -> Result<CallIdentity, AuthenticationError> {
        let token = parse_bearer_token(metadata.auth_header.as_deref())?;
        let claims = decode_claims(&token)?;
        if let Some(exp) = claims.exp {
            check_expiry(exp, now, self.leeway_secs)?;
        }
        if let Some(not_before) = claims.nbf
            && now.saturating_add(self.leeway_secs) < not_before
        {
            return Err(AuthenticationError::NotYetValid {
                not_before,
            });
        }
        let subject = claims
            .sub
            .filter(|sub| !sub.trim().is_empty())
            .ok_or_else(|| AuthenticationError::Malformed("token missing sub claim".to_string()))?;
        let implicit = implicit_groups(&subject);
        let mut identity = CallIdentity::new(subject, CredentialKind::BearerClaims)
            .ok_or_else(|| AuthenticationError::Malformed("empty subject".to_string()))?
            .with_groups(claims.groups)
            .with_groups(implicit)
            .with_fingerprint(fingerprint(&token));
        for (key, values) in extra_claims(claims.other) {
            identity = identity.with_extra(key, values);
        }
        if let Some(exp) = claims.exp {
            identity = identity.with_expires_at(exp);
        }
        Ok(identity)
    }
}

impl IdentityExtractor for BearerClaimsExtractor {
    fn extract(&self, metadata: &CallMetadata) -> Result<CallIdentity, AuthenticationError> {
        self.extract_at(metadata, unix_now())
    }

    fn mode(&self) -> AuthMode {
        AuthMode::BearerClaims
    }
}

// ============================================================================
// SECTION: Static Tokens
// ============================================================================

/// Identity bound to a configured token.
#[derive(Debug, Clone)]
struct TokenEntry {
    /// Subject name.
    subject: String,
    /// Group memberships.
    groups: Vec<String>,
    /// Optional expiry (unix seconds).
    expires_at: Option<u64>,
}

/// Maps opaque bearer tokens to configured identities.
#[derive(Debug, Clone)]
pub struct StaticTokenExtractor {
    /// Token table.
    tokens: BTreeMap<String, TokenEntry>,
    /// Clock-skew leeway applied to `expires_at`.
    leeway_secs: u64,
}

impl StaticTokenExtractor {
    /// Builds a token extractor from configuration entries.
    #[must_use]
    pub fn new(tokens: &[StaticTokenConfig], leeway_secs: u64) -> Self {
        let tokens = tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    TokenEntry {
                        subject: entry.subject.clone(),
                        groups: entry.groups.clone(),
                        expires_at: entry.expires_at,
                    },
                )
            })
            .collect();
        Self {
            tokens,
            leeway_secs,
        }
    }

    /// Extracts the identity as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the token is absent, unknown, or
    /// expired.
    pub fn extract_at(
        &self,
        metadata: &CallMetadata,
        now: u64,
    ) -> Result<CallIdentity, AuthenticationError> {
        let token = parse_bearer_token(metadata.auth_header.as_deref())?;
        let entry = self
            .tokens
            .get(&token)
            .ok_or_else(|| AuthenticationError::Rejected("unknown bearer token".to_string()))?;
        if let Some(expires_at) = entry.expires_at {
            check_expiry(expires_at, now, self.leeway_secs)?;
        }
        let mut identity = CallIdentity::new(entry.subject.clone(), CredentialKind::StaticToken)
            .ok_or_else(|| AuthenticationError::Malformed("empty subject".to_string()))?
            .with_groups(entry.groups.iter().cloned())
            .with_fingerprint(fingerprint(&token));
        if let Some(expires_at) = entry.expires_at {
            identity = identity.with_expires_at(expires_at);
        }
        Ok(identity)
    }
}

impl IdentityExtractor for StaticTokenExtractor {
    fn extract(&self, metadata: &CallMetadata) -> Result<CallIdentity, AuthenticationError> {
        self.extract_at(metadata, unix_now())
    }

    fn mode(&self) -> AuthMode {
        AuthMode::StaticTokens
    }
}

// ============================================================================
// SECTION: mTLS Subject
// ============================================================================

/// Trusts the client subject asserted by a TLS-terminating proxy.
#[derive(Debug, Clone)]
pub struct MtlsSubjectExtractor {
    /// Allowed subjects; empty rejects every subject.
    allowed: BTreeSet<String>,
    /// Group mappings per subject.
    principals: BTreeMap<String, Vec<String>>,
}

impl MtlsSubjectExtractor {
    /// Builds a subject extractor.
    #[must_use]
    pub fn new(allowed: &[String], principals: &[PrincipalConfig]) -> Self {
        let mut mapped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for principal in principals {
            mapped.entry(principal.subject.clone()).or_default().extend(principal.groups.clone());
        }
        Self {
            allowed: allowed.iter().cloned().collect(),
            principals: mapped,
        }
    }
}

impl IdentityExtractor for MtlsSubjectExtractor {
    fn extract(&self, metadata: &CallMetadata) -> Result<CallIdentity, AuthenticationError> {
        let subject = metadata
            .client_subject
            .as_deref()
            .ok_or_else(|| AuthenticationError::Missing("missing mTLS client subject".to_string()))?
            .trim();
        if subject.is_empty() || subject.len() > MAX_AUTH_HEADER_BYTES {
            return Err(AuthenticationError::Malformed("invalid mTLS client subject".to_string()));
        }
        if !self.allowed.contains(subject) {
            return Err(AuthenticationError::Rejected(
                "client subject not in allowlist".to_string(),
            ));
        }
        let groups = self.principals.get(subject).cloned().unwrap_or_default();
        CallIdentity::new(subject, CredentialKind::MtlsSubject)
            .map(|identity| identity.with_groups(groups))
            .ok_or_else(|| AuthenticationError::Malformed("empty subject".to_string()))
    }

    fn mode(&self) -> AuthMode {
        AuthMode::MtlsSubject
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthenticationError> {
    let header = auth_header
        .ok_or_else(|| AuthenticationError::Missing("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthenticationError::Malformed("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthenticationError::Malformed("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

/// Decodes the payload segment of a compact JWT.
fn decode_claims(token: &str) -> Result<BearerClaims, AuthenticationError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(AuthenticationError::Malformed("token is not a compact jwt".to_string()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthenticationError::Malformed("token payload is not base64url".to_string()))?;
    serde_json::from_slice(&bytes).map_err(|_| {
        AuthenticationError::Malformed("token payload is not a claims object".to_string())
    })
}

/// Fails when `expires_at` plus leeway is in the past.
const fn check_expiry(
    expires_at: u64,
    now: u64,
    leeway_secs: u64,
) -> Result<(), AuthenticationError> {
    if now > expires_at.saturating_add(leeway_secs) {
        return Err(AuthenticationError::Expired);
    }
    Ok(())
}

/// Selects unregistered string and string-list claims as extra attributes.
///
/// Claims of any other shape are ignored. Output is bounded by
/// [`MAX_EXTRA_CLAIMS`] and [`MAX_EXTRA_VALUES`].
fn extra_claims(claims: BTreeMap<String, Value>) -> Vec<(String, Vec<String>)> {
    claims
        .into_iter()
        .filter(|(key, _)| !key.is_empty() && !REGISTERED_CLAIMS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let values = match value {
                Value::String(single) => vec![single],
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect::<Option<Vec<String>>>()?,
                _ => return None,
            };
            (values.len() <= MAX_EXTRA_VALUES).then_some((key, values))
        })
        .take(MAX_EXTRA_CLAIMS)
        .collect()
}

/// Returns groups Kubernetes implies for service-account subjects.
fn implicit_groups(subject: &str) -> Vec<String> {
    let Some(rest) = subject.strip_prefix(SERVICE_ACCOUNT_PREFIX) else {
        return Vec::new();
    };
    let Some((namespace, name)) = rest.split_once(':') else {
        return Vec::new();
    };
    if namespace.is_empty() || name.is_empty() {
        return Vec::new();
    }
    vec![
        SERVICE_ACCOUNTS_GROUP.to_string(),
        format!("{SERVICE_ACCOUNTS_GROUP}:{namespace}"),
        AUTHENTICATED_GROUP.to_string(),
    ]
}

/// Returns the SHA-256 hex fingerprint of a credential.
#[must_use]
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    hex_encode(&digest)
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Returns the current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
