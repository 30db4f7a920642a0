use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::engine::{QuotaEngine, UsageDecision};
use crate::messages::{DecisionKind, Locale, MessageLocalizer};
use crate::tier::{AccountTier, ResetPeriod, ResourceType};
use crate::window::WindowClock;

/// The two conversational assistants subject to feature-level gating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssistantId {
    Coly,
    Max,
}

impl AssistantId {
    pub fn resource(self) -> ResourceType {
        match self {
            AssistantId::Coly => ResourceType::AssistantColy,
            AssistantId::Max => ResourceType::AssistantMax,
        }
    }
}

/// Decision plus the user-facing message, when one applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantVerdict {
    pub decision: UsageDecision,
    pub message: Option<String>,
}

/// Thin façade over the engine for the assistants.
///
/// Adds a permission pre-check ahead of any quota work: some tiers cannot
/// use a given assistant at all, independent of quota, and that outcome
/// must stay visibly distinct from quota exhaustion.
pub struct AssistantGate {
    engine: Arc<QuotaEngine>,
    permissions: HashMap<AssistantId, HashSet<AccountTier>>,
}

impl AssistantGate {
    pub fn new(engine: Arc<QuotaEngine>) -> Self {
        Self {
            engine,
            permissions: Self::default_permissions(),
        }
    }

    pub fn with_permissions(
        engine: Arc<QuotaEngine>,
        permissions: HashMap<AssistantId, HashSet<AccountTier>>,
    ) -> Self {
        Self {
            engine,
            permissions,
        }
    }

    /// Start from the built-in permission table and replace entries for
    /// the assistants present in `overrides` (the shape produced by
    /// `QuotaConfig::permission_overrides`).
    pub fn with_permission_overrides(
        engine: Arc<QuotaEngine>,
        overrides: HashMap<AssistantId, HashSet<AccountTier>>,
    ) -> Self {
        let mut permissions = Self::default_permissions();
        permissions.extend(overrides);
        Self {
            engine,
            permissions,
        }
    }

    /// Coly requires at least a paying customer account; Max is open to
    /// every registered account. Anonymous visitors get neither.
    fn default_permissions() -> HashMap<AssistantId, HashSet<AccountTier>> {
        use AccountTier::*;
        HashMap::from([
            (
                AssistantId::Coly,
                HashSet::from([
                    Customer,
                    Premium,
                    FreeBusiness,
                    ProfessionalBusiness,
                    EnterpriseBusiness,
                ]),
            ),
            (
                AssistantId::Max,
                HashSet::from([
                    Free,
                    Customer,
                    Premium,
                    FreeBusiness,
                    ProfessionalBusiness,
                    EnterpriseBusiness,
                ]),
            ),
        ])
    }

    pub fn feature_permission(&self, assistant: AssistantId, tier: AccountTier) -> bool {
        self.permissions
            .get(&assistant)
            .is_some_and(|tiers| tiers.contains(&tier))
    }

    pub async fn evaluate_assistant(
        &self,
        subject: &str,
        assistant: AssistantId,
        tier: AccountTier,
        locale_hint: Option<&str>,
    ) -> AssistantVerdict {
        self.evaluate_assistant_at(subject, assistant, tier, locale_hint, Utc::now())
            .await
    }

    pub async fn evaluate_assistant_at(
        &self,
        subject: &str,
        assistant: AssistantId,
        tier: AccountTier,
        locale_hint: Option<&str>,
        now: DateTime<Utc>,
    ) -> AssistantVerdict {
        let locale = Locale::from_hint(locale_hint);

        if !self.feature_permission(assistant, tier) {
            // Short-circuit before the engine; the store is never
            // contacted. The window math here only fills in `reset_at`.
            debug!(subject, assistant = %assistant, tier = %tier, "assistant not available to tier");
            let window = WindowClock::current_window(ResetPeriod::Hourly, now);
            return AssistantVerdict {
                decision: UsageDecision {
                    admitted: false,
                    current: 0,
                    limit: 0,
                    remaining: 0,
                    reset_at: window.end,
                    warning: false,
                },
                message: Some(
                    MessageLocalizer::render(assistant, DecisionKind::FeatureUnavailable, locale)
                        .to_string(),
                ),
            };
        }

        let decision = self
            .engine
            .evaluate_at(subject, assistant.resource(), tier, now)
            .await;

        let message = if !decision.admitted {
            Some(MessageLocalizer::render(
                assistant,
                DecisionKind::DeniedTired,
                locale,
            ))
        } else if decision.current == 1 {
            // First admission of a fresh window.
            Some(MessageLocalizer::render(
                assistant,
                DecisionKind::Resumed,
                locale,
            ))
        } else if decision.warning {
            Some(MessageLocalizer::render(
                assistant,
                DecisionKind::ApproachingLimit,
                locale,
            ))
        } else {
            None
        };

        AssistantVerdict {
            decision,
            message: message.map(str::to_string),
        }
    }
}
