use core_config::{env_parse, ConfigError, FromEnv};
use std::time::Duration;

use crate::options::CheapestScope;

pub const CHEAPEST_SCOPE_VAR: &str = "PRICING_CHEAPEST_SCOPE";
pub const CACHE_ENABLED_VAR: &str = "PRICING_CACHE_ENABLED";
pub const CACHE_TTL_VAR: &str = "PRICING_CACHE_TTL_SECS";
pub const CACHE_MAX_ENTRIES_VAR: &str = "PRICING_CACHE_MAX_ENTRIES";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 1024;

/// Runtime knobs of the pricing service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingConfig {
    pub cheapest_scope: CheapestScope,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
}

impl PricingConfig {
    pub fn without_cache() -> Self {
        Self {
            cache_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cheapest_scope: CheapestScope::default(),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl FromEnv for PricingConfig {
    /// Reads from environment variables with defaults:
    /// - PRICING_CHEAPEST_SCOPE: `all` or `full_range`, defaults to `all`
    /// - PRICING_CACHE_ENABLED: defaults to true
    /// - PRICING_CACHE_TTL_SECS: defaults to 300
    /// - PRICING_CACHE_MAX_ENTRIES: defaults to 1024
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cheapest_scope: env_parse(CHEAPEST_SCOPE_VAR, CheapestScope::default())?,
            cache_enabled: env_parse(CACHE_ENABLED_VAR, true)?,
            cache_ttl: Duration::from_secs(env_parse(CACHE_TTL_VAR, DEFAULT_CACHE_TTL_SECS)?),
            cache_max_entries: env_parse(CACHE_MAX_ENTRIES_VAR, DEFAULT_CACHE_MAX_ENTRIES)?,
        })
    }
}
