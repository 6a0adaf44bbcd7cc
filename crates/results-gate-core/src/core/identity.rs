// crates/results-gate-core/src/core/identity.rs
// ============================================================================
// Module: Call Identity
// Description: Identity of the caller as derived from transport metadata.
// Purpose: Carry the subject and group memberships evaluated by the authority.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CallIdentity`] is created once at call entry by an identity extractor
//! and discarded when the call finishes. It is immutable: every field is set
//! at construction time through the builder-style helpers.
//!
//! ## Invariants
//! - The subject is never empty.
//! - [`IdentityKey`] covers subject, groups, and extra attributes; credential
//!   metadata (fingerprint, expiry) is excluded so two tokens for the same
//!   principal share cached decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// How the caller proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Bearer JWT whose claims were read after upstream verification.
    BearerClaims,
    /// Opaque bearer token mapped by configuration.
    StaticToken,
    /// Client certificate subject asserted by a trusted TLS proxy.
    MtlsSubject,
}

impl CredentialKind {
    /// Returns a stable label for audit output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BearerClaims => "bearer_claims",
            Self::StaticToken => "static_token",
            Self::MtlsSubject => "mtls_subject",
        }
    }
}

/// Authenticated caller identity for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallIdentity {
    /// Subject (user or service account) name.
    subject: String,
    /// Group memberships.
    groups: BTreeSet<String>,
    /// Extra attributes forwarded to the authority.
    extra: BTreeMap<String, Vec<String>>,
    /// Credential kind used to authenticate.
    credential: CredentialKind,
    /// SHA-256 fingerprint of the credential, when it was a token.
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    /// Credential expiry in unix seconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
}

impl CallIdentity {
    /// Creates a new identity.
    ///
    /// Returns `None` when the subject is empty.
    #[must_use]
    pub fn new(subject: impl Into<String>, credential: CredentialKind) -> Option<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return None;
        }
        Some(Self {
            subject,
            groups: BTreeSet::new(),
            extra: BTreeMap::new(),
            credential,
            fingerprint: None,
            expires_at: None,
        })
    }

    /// Returns a copy with additional groups.
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into).filter(|group| !group.is_empty()));
        self
    }

    /// Returns a copy with an extra attribute.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.extra.insert(key.into(), values);
        self
    }

    /// Returns a copy with a credential fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Returns a copy with a credential expiry (unix seconds).
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the group memberships.
    #[must_use]
    pub const fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Returns the extra attributes.
    #[must_use]
    pub const fn extra(&self) -> &BTreeMap<String, Vec<String>> {
        &self.extra
    }

    /// Returns the credential kind.
    #[must_use]
    pub const fn credential(&self) -> CredentialKind {
        self.credential
    }

    /// Returns the credential fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Returns the credential expiry in unix seconds.
    #[must_use]
    pub const fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Returns true when the identity is a member of the group.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Returns the cache key for this identity.
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            subject: self.subject.clone(),
            groups: self.groups.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Policy-relevant projection of a [`CallIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    /// Subject name.
    pub subject: String,
    /// Group memberships.
    pub groups: BTreeSet<String>,
    /// Extra attributes.
    pub extra: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use super::CallIdentity;
    use super::CredentialKind;

    #[test]
    fn empty_subject_is_rejected() {
        assert!(CallIdentity::new("", CredentialKind::StaticToken).is_none());
        assert!(CallIdentity::new("   ", CredentialKind::StaticToken).is_none());
    }

    #[test]
    fn key_ignores_credential_metadata() {
        let first = CallIdentity::new("svc:writer", CredentialKind::StaticToken)
            .unwrap()
            .with_groups(["writers"])
            .with_fingerprint("aaa");
        let second = CallIdentity::new("svc:writer", CredentialKind::BearerClaims)
            .unwrap()
            .with_groups(["writers"])
            .with_fingerprint("bbb")
            .with_expires_at(10);
        assert_eq!(first.key(), second.key());
    }

    #[test]
    fn key_distinguishes_groups() {
        let first = CallIdentity::new("svc:writer", CredentialKind::StaticToken)
            .unwrap()
            .with_groups(["writers"]);
        let second = CallIdentity::new("svc:writer", CredentialKind::StaticToken).unwrap();
        assert_ne!(first.key(), second.key());
        assert!(first.in_group("writers"));
    }
}
