// crates/results-gate-server/src/telemetry.rs
// ============================================================================
// Module: Gate Telemetry
// Description: Metric hooks for authorization decisions.
// Purpose: Expose decision counters and latencies without a metrics backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A thin metrics interface for gate outcomes and decision latency.
//! Deployments plug in their own exporter by implementing [`GateMetrics`];
//! [`DecisionStats`] keeps in-process counters and a bucketed latency
//! histogram for the server's stats endpoint. Labels never carry
//! credentials; subjects stay in the audit stream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for decision histograms.
pub const GATE_LATENCY_BUCKETS_MS: [u64; 14] =
    [1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];
/// Number of [`GateOutcome`] variants.
const OUTCOME_COUNT: usize = 5;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Terminal gate outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    /// The call was authorized.
    Allowed,
    /// The authority denied the call or no rule maps it.
    Denied,
    /// No valid credential was presented.
    Unauthenticated,
    /// The payload could not be mapped.
    InvalidRequest,
    /// The authority failed or timed out.
    Unavailable,
}

impl GateOutcome {
    /// Every outcome, in counter order.
    pub const ALL: [Self; OUTCOME_COUNT] = [
        Self::Allowed,
        Self::Denied,
        Self::Unauthenticated,
        Self::InvalidRequest,
        Self::Unavailable,
    ];

    /// Returns the counter slot for the outcome.
    const fn index(self) -> usize {
        match self {
            Self::Allowed => 0,
            Self::Denied => 1,
            Self::Unauthenticated => 2,
            Self::InvalidRequest => 3,
            Self::Unavailable => 4,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidRequest => "invalid_request",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Decision metric event payload.
#[derive(Debug, Clone)]
pub struct GateMetricEvent {
    /// Short method name, when the method is known.
    pub method: Option<&'static str>,
    /// Gate outcome.
    pub outcome: GateOutcome,
    /// Whether the decision came from the cache.
    pub cache_hit: bool,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for gate decisions.
pub trait GateMetrics: Send + Sync {
    /// Records a decision counter event.
    fn record_decision(&self, event: &GateMetricEvent);
    /// Records the end-to-end gate latency for a call.
    fn record_latency(&self, event: &GateMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl GateMetrics for NoopMetrics {
    fn record_decision(&self, _event: &GateMetricEvent) {}

    fn record_latency(&self, _event: &GateMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: In-Process Stats
// ============================================================================

/// Mutable counters behind [`DecisionStats`].
#[derive(Debug, Clone, Default)]
struct StatsState {
    /// Decisions per outcome, indexed by [`GateOutcome::ALL`] order.
    decisions: [u64; OUTCOME_COUNT],
    /// Decisions served from the cache.
    cache_hits: u64,
    /// Latency counts (length = `GATE_LATENCY_BUCKETS_MS.len() + 1`).
    latency_histogram: [u64; GATE_LATENCY_BUCKETS_MS.len() + 1],
}

/// Metrics sink keeping decision counters and a latency histogram in memory.
#[derive(Debug, Default)]
pub struct DecisionStats {
    /// Counter state.
    state: Mutex<StatsState>,
}

impl DecisionStats {
    /// Builds empty stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> DecisionStatsSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let decisions = GateOutcome::ALL
            .iter()
            .zip(state.decisions)
            .map(|(outcome, count)| (outcome.as_str(), count))
            .collect();
        DecisionStatsSnapshot {
            decisions,
            cache_hits: state.cache_hits,
            latency_buckets_ms: GATE_LATENCY_BUCKETS_MS.to_vec(),
            latency_histogram: state.latency_histogram.to_vec(),
            latency_p50_ms: histogram_percentile(&state.latency_histogram, 50),
            latency_p95_ms: histogram_percentile(&state.latency_histogram, 95),
        }
    }
}

impl GateMetrics for DecisionStats {
    fn record_decision(&self, event: &GateMetricEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = state.decisions.get_mut(event.outcome.index()) {
            *count = count.saturating_add(1);
        }
        if event.cache_hit {
            state.cache_hits = state.cache_hits.saturating_add(1);
        }
    }

    fn record_latency(&self, _event: &GateMetricEvent, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = state.latency_histogram.get_mut(latency_bucket_index(millis)) {
            *count = count.saturating_add(1);
        }
    }
}

/// Serializable view of [`DecisionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionStatsSnapshot {
    /// Decisions per outcome label.
    pub decisions: BTreeMap<&'static str, u64>,
    /// Decisions served from the cache.
    pub cache_hits: u64,
    /// Histogram upper bounds in milliseconds.
    pub latency_buckets_ms: Vec<u64>,
    /// Histogram counts (length = `latency_buckets_ms.len() + 1`).
    pub latency_histogram: Vec<u64>,
    /// Median latency estimate from the histogram.
    pub latency_p50_ms: u64,
    /// 95th percentile latency estimate from the histogram.
    pub latency_p95_ms: u64,
}

/// Returns the histogram slot for a latency; the last slot is overflow.
fn latency_bucket_index(millis: u64) -> usize {
    GATE_LATENCY_BUCKETS_MS
        .iter()
        .position(|upper_bound| millis <= *upper_bound)
        .unwrap_or(GATE_LATENCY_BUCKETS_MS.len())
}

/// Approximates a percentile as the upper bound of the bucket holding it.
fn histogram_percentile(counts: &[u64], percentile: u64) -> u64 {
    let total = counts.iter().fold(0_u64, |acc, count| acc.saturating_add(*count));
    let last = GATE_LATENCY_BUCKETS_MS.last().copied().unwrap_or(0);
    if total == 0 {
        return 0;
    }
    let rank = total.saturating_mul(percentile).saturating_add(99).saturating_div(100).max(1);
    let mut running = 0_u64;
    for (idx, count) in counts.iter().enumerate() {
        running = running.saturating_add(*count);
        if running >= rank {
            return GATE_LATENCY_BUCKETS_MS.get(idx).copied().unwrap_or(last);
        }
    }
    last
}

// ============================================================================
// SECTION: Tests
// ============================================================================
