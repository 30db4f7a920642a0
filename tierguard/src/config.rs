use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::{LimitOverride, TierCatalog};
use crate::engine::QuotaEngine;
use crate::error::{Error, ErrorDetails};
use crate::gate::AssistantId;
use crate::store::memory::MemoryUsageStore;
use crate::store::redis::RedisUsageStore;
use crate::store::UsageStore;
use crate::tier::AccountTier;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    100
}

/// Top-level TOML configuration.
///
/// Everything is optional: an empty file yields the built-in catalog and
/// permission tables. Limit changes take effect on the next evaluation;
/// the store schema is untouched.
///
/// ```toml
/// [engine]
/// fail_open = true
///
/// [store]
/// redis_url = "redis://127.0.0.1/"
/// timeout_ms = 100
///
/// [[catalog.limits]]
/// tier = "free"
/// resource = "chat"
/// max = 50
/// period = "daily"
///
/// [assistants.permissions]
/// coly = ["premium", "enterprise_business"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub assistants: AssistantsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default)]
    pub limits: Vec<LimitOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantsConfig {
    /// Per-assistant replacement of the default permission set. An
    /// assistant absent from the map keeps its built-in permissions.
    #[serde(default)]
    pub permissions: HashMap<AssistantId, Vec<AccountTier>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

impl QuotaConfig {
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        toml::from_str(raw).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse quota configuration: {e}"),
            })
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!(
                    "Failed to read quota configuration {}: {e}",
                    path.as_ref().display()
                ),
            })
        })?;
        Self::from_toml(&raw)
    }

    pub fn build_catalog(&self) -> TierCatalog {
        TierCatalog::with_overrides(self.catalog.limits.iter().copied())
    }

    /// Permission sets for assistants the config overrides; the gate falls
    /// back to its defaults for the rest.
    pub fn permission_overrides(&self) -> HashMap<AssistantId, HashSet<AccountTier>> {
        self.assistants
            .permissions
            .iter()
            .map(|(assistant, tiers)| (*assistant, tiers.iter().copied().collect()))
            .collect()
    }

    /// Build an engine from this configuration: Redis-backed when
    /// `store.redis_url` is set, in-memory otherwise.
    pub async fn build_engine(&self) -> Result<QuotaEngine, Error> {
        let store: Arc<dyn UsageStore> = match &self.store.redis_url {
            Some(url) => Arc::new(RedisUsageStore::connect(url, self.store.timeout_ms).await?),
            None => Arc::new(MemoryUsageStore::new()),
        };
        Ok(QuotaEngine::new(Arc::new(self.build_catalog()), store)
            .with_fail_open(self.engine.fail_open))
    }
}
