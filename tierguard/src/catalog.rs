use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tier::{AccountTier, ResetPeriod, ResourceType};

/// Resolved limit for one (tier, resource) pair. `max == 0` means the
/// resource is unavailable to that tier regardless of window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimit {
    pub resource: ResourceType,
    pub tier: AccountTier,
    pub max: u32,
    pub period: ResetPeriod,
}

/// Configuration override for a single catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOverride {
    pub tier: AccountTier,
    pub resource: ResourceType,
    pub max: u32,
    pub period: ResetPeriod,
}

/// Static mapping from (tier, resource) to a limit and reset period.
///
/// Pure lookup, no I/O. Unknown pairs fail closed (`max = 0`, hourly): a
/// configuration gap must never silently grant access to a resource no
/// limit was defined for. This is deliberately the opposite of the
/// engine's fail-open policy for *storage* errors.
#[derive(Debug, Default, Clone)]
pub struct TierCatalog {
    overrides: HashMap<(AccountTier, ResourceType), (u32, ResetPeriod)>,
}

impl TierCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: impl IntoIterator<Item = LimitOverride>) -> Self {
        Self {
            overrides: overrides
                .into_iter()
                .map(|o| ((o.tier, o.resource), (o.max, o.period)))
                .collect(),
        }
    }

    pub fn limit_for(&self, tier: AccountTier, resource: ResourceType) -> QuotaLimit {
        if let Some(&(max, period)) = self.overrides.get(&(tier, resource)) {
            return QuotaLimit {
                resource,
                tier,
                max,
                period,
            };
        }

        match Self::default_limit(tier, resource) {
            Some((max, period)) => QuotaLimit {
                resource,
                tier,
                max,
                period,
            },
            None => {
                warn!(
                    tier = %tier,
                    resource = %resource,
                    "no catalog entry for tier/resource pair, failing closed"
                );
                QuotaLimit {
                    resource,
                    tier,
                    max: 0,
                    period: ResetPeriod::Hourly,
                }
            }
        }
    }

    /// Built-in limit table.
    ///
    /// | Resource | Period | anon | free | customer | premium | free_biz | pro_biz | ent_biz |
    /// |---|---|---|---|---|---|---|---|---|
    /// | chat | daily | 5 | 30 | 60 | 150 | 150 | 400 | 1000 |
    /// | trending | monthly | 0 | 20 | 50 | 150 | 150 | 400 | 1500 |
    /// | ads | monthly | 0 | 0 | 0 | 0 | 3 | 15 | 60 |
    /// | products | monthly | 0 | 0 | 0 | 0 | 10 | 100 | 1000 |
    /// | stores | monthly | 0 | 0 | 0 | 0 | 1 | 3 | 10 |
    /// | assistant_coly | hourly | n/a | n/a | 10 | 25 | 25 | 50 | 100 |
    /// | assistant_max | hourly | n/a | 5 | 15 | 30 | 30 | 60 | 120 |
    ///
    /// "n/a" entries are deliberately undefined: those tiers cannot use the
    /// assistant at all (the gate's permission table denies them first),
    /// and the fail-closed lookup covers the case where the gate is
    /// bypassed.
    fn default_limit(tier: AccountTier, resource: ResourceType) -> Option<(u32, ResetPeriod)> {
        use AccountTier::*;
        use ResetPeriod::*;

        let limit = match resource {
            ResourceType::Chat => {
                let max = match tier {
                    Anonymous => 5,
                    Free => 30,
                    Customer => 60,
                    Premium | FreeBusiness => 150,
                    ProfessionalBusiness => 400,
                    EnterpriseBusiness => 1000,
                };
                (max, Daily)
            }
            ResourceType::Trending => {
                let max = match tier {
                    Anonymous => 0,
                    Free => 20,
                    Customer => 50,
                    Premium | FreeBusiness => 150,
                    ProfessionalBusiness => 400,
                    EnterpriseBusiness => 1500,
                };
                (max, Monthly)
            }
            ResourceType::Ads => {
                let max = match tier {
                    FreeBusiness => 3,
                    ProfessionalBusiness => 15,
                    EnterpriseBusiness => 60,
                    _ => 0,
                };
                (max, Monthly)
            }
            ResourceType::Products => {
                let max = match tier {
                    FreeBusiness => 10,
                    ProfessionalBusiness => 100,
                    EnterpriseBusiness => 1000,
                    _ => 0,
                };
                (max, Monthly)
            }
            ResourceType::Stores => {
                let max = match tier {
                    FreeBusiness => 1,
                    ProfessionalBusiness => 3,
                    EnterpriseBusiness => 10,
                    _ => 0,
                };
                (max, Monthly)
            }
            ResourceType::AssistantColy => {
                let max = match tier {
                    Anonymous | Free => return None,
                    Customer => 10,
                    Premium | FreeBusiness => 25,
                    ProfessionalBusiness => 50,
                    EnterpriseBusiness => 100,
                };
                (max, Hourly)
            }
            ResourceType::AssistantMax => {
                let max = match tier {
                    Anonymous => return None,
                    Free => 5,
                    Customer => 15,
                    Premium | FreeBusiness => 30,
                    ProfessionalBusiness => 60,
                    EnterpriseBusiness => 120,
                };
                (max, Hourly)
            }
        };

        Some(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_anonymous_chat_default() {
        let catalog = TierCatalog::new();
        let limit = catalog.limit_for(AccountTier::Anonymous, ResourceType::Chat);
        assert_eq!(limit.max, 5);
        assert_eq!(limit.period, ResetPeriod::Daily);
    }

    #[test]
    fn test_undefined_pair_fails_closed() {
        let catalog = TierCatalog::new();
        let limit = catalog.limit_for(AccountTier::Free, ResourceType::AssistantColy);
        assert_eq!(limit.max, 0);
        assert_eq!(limit.period, ResetPeriod::Hourly);
    }

    #[test]
    fn test_zero_max_is_defined_not_a_gap() {
        // Non-business tiers have ads explicitly at 0 (categorical deny),
        // which is distinct from a missing entry but behaves the same way.
        let catalog = TierCatalog::new();
        let limit = catalog.limit_for(AccountTier::Premium, ResourceType::Ads);
        assert_eq!(limit.max, 0);
        assert_eq!(limit.period, ResetPeriod::Monthly);
    }

    #[test]
    fn test_limits_non_decreasing_across_tiers() {
        let catalog = TierCatalog::new();
        for resource in ResourceType::iter() {
            let mut prev = 0u32;
            for tier in AccountTier::iter() {
                let max = catalog.limit_for(tier, resource).max;
                // Undefined assistant entries resolve to 0 for low tiers,
                // which keeps the sequence monotonic.
                if max > 0 {
                    assert!(
                        max >= prev,
                        "{resource} max decreased at {tier}: {max} < {prev}"
                    );
                    prev = max;
                }
            }
        }
    }

    #[test]
    fn test_override_replaces_default() {
        let catalog = TierCatalog::with_overrides([LimitOverride {
            tier: AccountTier::Free,
            resource: ResourceType::Chat,
            max: 3,
            period: ResetPeriod::Hourly,
        }]);
        let limit = catalog.limit_for(AccountTier::Free, ResourceType::Chat);
        assert_eq!(limit.max, 3);
        assert_eq!(limit.period, ResetPeriod::Hourly);

        // Untouched pairs keep their defaults.
        let other = catalog.limit_for(AccountTier::Customer, ResourceType::Chat);
        assert_eq!(other.max, 60);
    }

    #[test]
    fn test_override_can_define_a_missing_pair() {
        let catalog = TierCatalog::with_overrides([LimitOverride {
            tier: AccountTier::Free,
            resource: ResourceType::AssistantColy,
            max: 2,
            period: ResetPeriod::Hourly,
        }]);
        let limit = catalog.limit_for(AccountTier::Free, ResourceType::AssistantColy);
        assert_eq!(limit.max, 2);
    }
}
