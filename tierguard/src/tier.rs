use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Account classification assigned externally at signup/upgrade.
///
/// Ordering matters: later variants are "higher" tiers, and the catalog's
/// limits are expected to be non-decreasing in that order for any resource.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountTier {
    Anonymous,
    Free,
    Customer,
    Premium,
    FreeBusiness,
    ProfessionalBusiness,
    EnterpriseBusiness,
}

impl AccountTier {
    /// True for the three business tiers.
    pub fn is_business(self) -> bool {
        matches!(
            self,
            AccountTier::FreeBusiness
                | AccountTier::ProfessionalBusiness
                | AccountTier::EnterpriseBusiness
        )
    }
}

/// A gated capability. Each resource carries an independent limit and
/// reset period per tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
    Chat,
    Trending,
    Ads,
    Products,
    Stores,
    AssistantColy,
    AssistantMax,
}

/// How often a resource's usage counter rolls over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResetPeriod {
    Hourly,
    Daily,
    Monthly,
}
