pub mod catalog; // tier × resource → limit table
pub mod config; // TOML configuration surface
pub mod engine; // quota decision logic
pub mod error; // error handling
pub mod gate; // assistant façade with feature permissions
pub mod messages; // localized, persona-flavored user messages
pub mod middleware; // axum middleware for gated routes
pub mod store; // usage persistence (redis / in-memory)
pub mod tier; // account tiers, resources, reset periods
pub mod window; // fixed clock-window math

#[cfg(test)]
mod tests;

pub use catalog::{QuotaLimit, TierCatalog};
pub use config::QuotaConfig;
pub use engine::{QuotaEngine, QuotaEngineMetrics, UsageDecision};
pub use error::{Error, ErrorDetails};
pub use gate::{AssistantGate, AssistantId, AssistantVerdict};
pub use messages::{DecisionKind, Locale, MessageLocalizer};
pub use middleware::{quota_middleware, QuotaHeaders, QuotaLayerState, RequestIdentity};
pub use store::{memory::MemoryUsageStore, redis::RedisUsageStore, IncrementOutcome, UsageStore};
pub use tier::{AccountTier, ResetPeriod, ResourceType};
pub use window::{UsageWindow, WindowBounds, WindowClock};
