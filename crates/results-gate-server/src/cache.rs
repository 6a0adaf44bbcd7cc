// crates/results-gate-server/src/cache.rs
// ============================================================================
// Module: Decision Cache
// Description: Short-lived cache of authority decisions.
// Purpose: Avoid a review round trip for repeated identical calls.
// Dependencies: results-gate-config, results-gate-core
// ============================================================================

//! ## Overview
//! Decisions are keyed by the identity's policy-relevant projection and the
//! full authorization tuple, so two calls share an entry only when the
//! authority would be asked the identical question.
//!
//! ## Invariants
//! - Only decisions are cached; authority failures never are.
//! - An entry never outlives the credential that produced it.
//! - The cache never holds more than `max_entries` entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use results_gate_config::CacheConfig;
use results_gate_core::AuthorizationTuple;
use results_gate_core::CallIdentity;
use results_gate_core::Decision;
use results_gate_core::IdentityKey;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Cache lifetimes and bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Lifetime of allow decisions.
    pub allow_ttl: Duration,
    /// Lifetime of deny decisions; zero disables deny caching.
    pub deny_ttl: Duration,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            allow_ttl: Duration::from_millis(config.allow_ttl_ms),
            deny_ttl: Duration::from_millis(config.deny_ttl_ms),
            max_entries: config.max_entries,
        }
    }
}

/// Cache key: who is asking and what they ask.
type CacheKey = (IdentityKey, AuthorizationTuple);

/// Stored decision with its lifetime.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Cached decision.
    decision: Decision,
    /// Instant after which the entry is stale.
    expires_at: Instant,
    /// Insertion instant, used for eviction order.
    inserted_at: Instant,
}

/// Bounded TTL cache of authority decisions.
#[derive(Debug)]
pub struct DecisionCache {
    /// Lifetimes and bounds.
    policy: CachePolicy,
    /// Entries keyed by identity and tuple.
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl DecisionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cache policy.
    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Looks up a live decision.
    #[must_use]
    pub fn get(&self, identity: &CallIdentity, tuple: &AuthorizationTuple) -> Option<Decision> {
        self.get_at(identity, tuple, Instant::now())
    }

    /// Looks up a decision that is live at `now`.
    #[must_use]
    pub fn get_at(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
        now: Instant,
    ) -> Option<Decision> {
        let mut entries = self.entries.lock().ok()?;
        let key = (identity.key(), tuple.clone());
        match entries.get(&key) {
            Some(entry) if entry.expires_at > now => Some(entry.decision.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Stores a decision.
    pub fn insert(&self, identity: &CallIdentity, tuple: &AuthorizationTuple, decision: &Decision) {
        self.insert_at(identity, tuple, decision, Instant::now(), unix_now_secs());
    }

    /// Stores a decision as of `now`, capping its lifetime at the credential
    /// expiry relative to `unix_now` (seconds).
    pub fn insert_at(
        &self,
        identity: &CallIdentity,
        tuple: &AuthorizationTuple,
        decision: &Decision,
        now: Instant,
        unix_now: u64,
    ) {
        let mut ttl = if decision.allowed { self.policy.allow_ttl } else { self.policy.deny_ttl };
        if let Some(expires_at) = identity.expires_at() {
            ttl = ttl.min(Duration::from_secs(expires_at.saturating_sub(unix_now)));
        }
        if ttl.is_zero() || self.policy.max_entries == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let key = (identity.key(), tuple.clone());
        if !entries.contains_key(&key) && entries.len() >= self.policy.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.policy.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            CacheEntry {
                decision: decision.clone(),
                expires_at: now + ttl,
                inserted_at: now,
            },
        );
    }

    /// Returns the number of stored entries, live or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Returns the current unix time in seconds.
fn unix_now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
