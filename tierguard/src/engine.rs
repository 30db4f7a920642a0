use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::TierCatalog;
use crate::store::UsageStore;
use crate::tier::{AccountTier, ResourceType};
use crate::window::{WindowBounds, WindowClock};

/// Outcome of one quota evaluation. Computed fresh per request and never
/// cached across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDecision {
    pub admitted: bool,
    pub current: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub warning: bool,
}

/// Counters for operational visibility.
#[derive(Debug, Default)]
pub struct QuotaEngineMetrics {
    pub admitted: AtomicU64,
    pub denied: AtomicU64,
    pub categorical_denials: AtomicU64,
    pub race_losses: AtomicU64,
    pub degraded: AtomicU64,
}

impl QuotaEngineMetrics {
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_categorical_denial(&self) {
        self.categorical_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_race_lost(&self) {
        self.race_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }
}

/// Orchestrates tier → limit → window → admit/deny → warning.
///
/// Expected business outcomes (denial, warning, race loss) are values in
/// the returned `UsageDecision`, never errors. Store connectivity failures
/// follow the fail-open policy: a transient outage must not lock out
/// legitimate users, but it is recorded as a degraded-mode event.
pub struct QuotaEngine {
    catalog: Arc<TierCatalog>,
    store: Arc<dyn UsageStore>,
    fail_open: bool,
    metrics: Arc<QuotaEngineMetrics>,
}

impl QuotaEngine {
    pub fn new(catalog: Arc<TierCatalog>, store: Arc<dyn UsageStore>) -> Self {
        Self {
            catalog,
            store,
            fail_open: true,
            metrics: Arc::new(QuotaEngineMetrics::default()),
        }
    }

    /// Flip the policy for store errors. Defaults to open (admit).
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn metrics(&self) -> &QuotaEngineMetrics {
        &self.metrics
    }

    pub async fn evaluate(
        &self,
        subject: &str,
        resource: ResourceType,
        tier: AccountTier,
    ) -> UsageDecision {
        self.evaluate_at(subject, resource, tier, Utc::now()).await
    }

    /// Evaluation against an explicit clock, used by tests and batch
    /// tooling. `evaluate` is the production entry point.
    pub async fn evaluate_at(
        &self,
        subject: &str,
        resource: ResourceType,
        tier: AccountTier,
        now: DateTime<Utc>,
    ) -> UsageDecision {
        let limit = self.catalog.limit_for(tier, resource);
        let window = WindowClock::current_window(limit.period, now);

        if limit.max == 0 {
            // Categorical exclusion: decided before any storage I/O and
            // entirely side-effect-free.
            self.metrics.record_categorical_denial();
            self.metrics.record_denied();
            debug!(subject, resource = %resource, tier = %tier, "resource unavailable to tier");
            return Self::denied(0, 0, &window);
        }

        let usage = match self.store.get_or_init(subject, resource, &window).await {
            Ok(usage) => usage,
            Err(e) => {
                return self
                    .handle_read_failure(subject, resource, limit.max, &window, &e)
                    .await
            }
        };

        if usage.count >= limit.max {
            self.metrics.record_denied();
            debug!(
                subject,
                resource = %resource,
                current = usage.count,
                limit = limit.max,
                "quota exhausted"
            );
            return Self::denied(usage.count, limit.max, &window);
        }

        let outcome = match self
            .store
            .increment_if_below(subject, resource, &window, limit.max)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Read succeeded but the write did not: best-effort,
                // swallowed. The slot is admitted without being recorded.
                self.metrics.record_degraded();
                warn!(
                    subject,
                    resource = %resource,
                    error = %e,
                    "usage increment failed, admitting without recording (degraded)"
                );
                self.metrics.record_admitted();
                return UsageDecision {
                    admitted: true,
                    current: usage.count,
                    limit: limit.max,
                    remaining: limit.max - usage.count,
                    reset_at: window.end,
                    warning: false,
                };
            }
        };

        if !outcome.success {
            // Lost the race for the last slot; identical to a normal
            // denial, and deliberately not retried.
            self.metrics.record_race_lost();
            self.metrics.record_denied();
            debug!(subject, resource = %resource, "increment lost race for last slot");
            return Self::denied(outcome.new_count, limit.max, &window);
        }

        let remaining = limit.max - outcome.new_count;
        let warning = outcome.new_count >= warning_threshold(limit.max);
        self.metrics.record_admitted();
        debug!(
            subject,
            resource = %resource,
            current = outcome.new_count,
            remaining,
            warning,
            "usage admitted"
        );

        UsageDecision {
            admitted: true,
            current: outcome.new_count,
            limit: limit.max,
            remaining,
            reset_at: window.end,
            warning,
        }
    }

    async fn handle_read_failure(
        &self,
        subject: &str,
        resource: ResourceType,
        max: u32,
        window: &WindowBounds,
        error: &crate::error::Error,
    ) -> UsageDecision {
        self.metrics.record_degraded();
        warn!(
            subject,
            resource = %resource,
            error = %error,
            "usage store read failed, operating degraded"
        );

        if !self.fail_open {
            self.metrics.record_denied();
            return Self::denied(0, max, window);
        }

        // The read glitched but the store may still take writes: record
        // the usage best-effort so the counter stays honest, swallowing a
        // second failure.
        if let Err(e) = self
            .store
            .increment_if_below(subject, resource, window, max)
            .await
        {
            debug!(subject, resource = %resource, error = %e, "best-effort increment also failed");
        }

        // Never punish users for infrastructure failure: treat the caller
        // as having consumed nothing this window.
        self.metrics.record_admitted();
        UsageDecision {
            admitted: true,
            current: 0,
            limit: max,
            remaining: max,
            reset_at: window.end,
            warning: false,
        }
    }

    fn denied(current: u32, max: u32, window: &WindowBounds) -> UsageDecision {
        UsageDecision {
            admitted: false,
            current,
            limit: max,
            remaining: 0,
            reset_at: window.end,
            warning: false,
        }
    }
}

/// The warning flag flips on the admission whose post-increment count
/// reaches `floor(max * 0.8)`.
fn warning_threshold(max: u32) -> u32 {
    (u64::from(max) * 8 / 10) as u32
}
