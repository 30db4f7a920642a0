use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use crate::catalog::{LimitOverride, TierCatalog};
use crate::engine::QuotaEngine;
use crate::error::Error;
use crate::gate::{AssistantGate, AssistantId};
use crate::messages::{DecisionKind, Locale, MessageLocalizer};
use crate::store::memory::MemoryUsageStore;
use crate::store::{IncrementOutcome, UsageStore};
use crate::tier::{AccountTier, ResetPeriod, ResourceType};
use crate::window::{UsageWindow, WindowBounds};

/// Store wrapper that counts every call, for asserting that a code path
/// never touched persistence.
struct ProbeStore {
    inner: MemoryUsageStore,
    calls: AtomicUsize,
}

impl ProbeStore {
    fn new() -> Self {
        Self {
            inner: MemoryUsageStore::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UsageStore for ProbeStore {
    async fn get_or_init(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
    ) -> Result<UsageWindow, Error> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.get_or_init(subject, resource, window).await
    }

    async fn increment_if_below(
        &self,
        subject: &str,
        resource: ResourceType,
        window: &WindowBounds,
        limit: u32,
    ) -> Result<IncrementOutcome, Error> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner
            .increment_if_below(subject, resource, window, limit)
            .await
    }
}

fn customer_chat_engine(max: u32) -> (Arc<QuotaEngine>, Arc<MemoryUsageStore>) {
    let catalog = TierCatalog::with_overrides([LimitOverride {
        tier: AccountTier::Customer,
        resource: ResourceType::Chat,
        max,
        period: ResetPeriod::Daily,
    }]);
    let store = Arc::new(MemoryUsageStore::new());
    let engine = Arc::new(QuotaEngine::new(Arc::new(catalog), store.clone()));
    (engine, store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_admissions_never_exceed_limit() {
    let (engine, _) = customer_chat_engine(10);

    let mut handles = Vec::new();
    for _ in 0..50 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .evaluate("u1", ResourceType::Chat, AccountTier::Customer)
                .await
                .admitted
        }));
    }

    let admitted = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn test_window_isolation() {
    let store = Arc::new(MemoryUsageStore::new());
    let engine = Arc::new(QuotaEngine::new(Arc::new(TierCatalog::new()), store));

    // Burn some free-tier chat quota.
    for _ in 0..3 {
        assert!(
            engine
                .evaluate("u1", ResourceType::Chat, AccountTier::Free)
                .await
                .admitted
        );
    }

    // A different resource for the same subject starts from zero.
    let trending = engine
        .evaluate("u1", ResourceType::Trending, AccountTier::Free)
        .await;
    assert_eq!(trending.current, 1);

    // A different subject starts from zero for the same resource.
    let other = engine
        .evaluate("u2", ResourceType::Chat, AccountTier::Free)
        .await;
    assert_eq!(other.current, 1);

    // And u1's chat counter is unaffected by either.
    let chat = engine
        .evaluate("u1", ResourceType::Chat, AccountTier::Free)
        .await;
    assert_eq!(chat.current, 4);
}

#[tokio::test]
async fn test_categorical_deny_is_side_effect_free() {
    let store = Arc::new(MemoryUsageStore::new());
    let engine = QuotaEngine::new(Arc::new(TierCatalog::new()), store.clone());

    // Anonymous trending is 0 in the default catalog.
    for _ in 0..10 {
        let d = engine
            .evaluate("anon", ResourceType::Trending, AccountTier::Anonymous)
            .await;
        assert!(!d.admitted);
        assert_eq!(d.remaining, 0);
    }
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn test_warning_flips_at_floor_of_eighty_percent() {
    // (max, first admission carrying the warning flag)
    for &(max, first_warning) in &[(1u32, 1u32), (4, 3), (5, 4), (10, 8), (100, 80)] {
        let (engine, _) = customer_chat_engine(max);
        for n in 1..=max {
            let d = engine
                .evaluate("u1", ResourceType::Chat, AccountTier::Customer)
                .await;
            assert!(d.admitted, "max={max}: admission {n} should succeed");
            assert_eq!(
                d.warning,
                n >= first_warning,
                "max={max}: wrong warning flag on admission {n}"
            );
        }
    }
}

#[tokio::test]
async fn test_rollover_resets_exactly_once() {
    let (engine, _) = customer_chat_engine(3);
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 13, 0, 0).unwrap();

    for _ in 0..3 {
        assert!(
            engine
                .evaluate_at("u1", ResourceType::Chat, AccountTier::Customer, now)
                .await
                .admitted
        );
    }
    assert!(
        !engine
            .evaluate_at("u1", ResourceType::Chat, AccountTier::Customer, now)
            .await
            .admitted
    );

    // Past the window boundary the next call is admitted with a reset
    // counter, not max+1.
    let later = now + Duration::days(1);
    let d = engine
        .evaluate_at("u1", ResourceType::Chat, AccountTier::Customer, later)
        .await;
    assert!(d.admitted);
    assert_eq!(d.current, 1);
}

#[tokio::test]
async fn test_anonymous_chat_scenario() {
    let store = Arc::new(MemoryUsageStore::new());
    let engine = QuotaEngine::new(Arc::new(TierCatalog::new()), store);
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 13, 0, 0).unwrap();

    for expected_remaining in (0..5).rev() {
        let d = engine
            .evaluate_at("visitor-1", ResourceType::Chat, AccountTier::Anonymous, now)
            .await;
        assert!(d.admitted);
        assert_eq!(d.remaining, expected_remaining);
    }

    let denied = engine
        .evaluate_at("visitor-1", ResourceType::Chat, AccountTier::Anonymous, now)
        .await;
    assert!(!denied.admitted);
    assert_eq!(denied.remaining, 0);
    assert_eq!(
        denied.reset_at,
        Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_feature_gated_assistant_never_touches_store() {
    let store = Arc::new(ProbeStore::new());
    let engine = Arc::new(QuotaEngine::new(Arc::new(TierCatalog::new()), store.clone()));
    let gate = AssistantGate::new(engine);

    let verdict = gate
        .evaluate_assistant("u1", AssistantId::Coly, AccountTier::Free, None)
        .await;

    assert!(!verdict.decision.admitted);
    assert_eq!(store.call_count(), 0);

    let msg = verdict.message.unwrap();
    assert!(MessageLocalizer::variants(
        AssistantId::Coly,
        DecisionKind::FeatureUnavailable,
        Locale::En
    )
    .contains(&msg.as_str()));
    assert!(!MessageLocalizer::variants(
        AssistantId::Coly,
        DecisionKind::DeniedTired,
        Locale::En
    )
    .contains(&msg.as_str()));
}
