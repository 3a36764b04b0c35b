//! Engine configuration.
//!
//! Everything is overridable from the environment so deployments can
//! point the engine at a mirror, narrow the region scope, or mock the
//! whole feed in tests.

use regex::Regex;
use serde::Deserialize;

use pricebook_common::{PricebookError, Result};

/// Where the feeds live and which slices of them to synchronize.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the price feed endpoint, without trailing slash.
    pub base_url: String,
    /// Path of the offer index document, relative to `base_url`.
    pub index_path: String,
    /// Path of the spot market feed. Optional at runtime: a missing
    /// or failing spot feed degrades the pass instead of failing it.
    pub spot_path: String,
    /// Path of the block storage price feed (callback-wrapped JSON).
    pub block_storage_path: String,
    /// Regex of region codes to synchronize.
    pub enabled_regions: String,
    /// Regex of operating systems to keep.
    pub enabled_os: String,
    /// Regex of resource type codes to keep.
    pub enabled_types: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            base_url: "https://pricing.api.example.com".to_string(),
            index_path: "/offers/v1.0/index.json".to_string(),
            spot_path: "/spot/prices.json".to_string(),
            block_storage_path: "/pricing/block-storage.js".to_string(),
            enabled_regions: ".*".to_string(),
            enabled_os: ".*".to_string(),
            enabled_types: ".*".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = SyncConfig::default();
        SyncConfig {
            base_url: env_or("PRICEBOOK_BASE_URL", &defaults.base_url),
            index_path: env_or("PRICEBOOK_INDEX_PATH", &defaults.index_path),
            spot_path: env_or("PRICEBOOK_SPOT_PATH", &defaults.spot_path),
            block_storage_path: env_or(
                "PRICEBOOK_BLOCK_STORAGE_PATH",
                &defaults.block_storage_path,
            ),
            enabled_regions: env_or("PRICEBOOK_ENABLED_REGIONS", &defaults.enabled_regions),
            enabled_os: env_or("PRICEBOOK_ENABLED_OS", &defaults.enabled_os),
            enabled_types: env_or("PRICEBOOK_ENABLED_TYPES", &defaults.enabled_types),
        }
    }

    /// Compile the filter expressions once for the run.
    pub fn compile_filters(&self) -> Result<Filters> {
        Ok(Filters {
            regions: compile(&self.enabled_regions)?,
            os: compile_ci(&self.enabled_os)?,
            types: compile(&self.enabled_types)?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| PricebookError::Config(format!("invalid filter '{pattern}': {e}")))
}

fn compile_ci(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i)^(?:{pattern})$"))
        .map_err(|e| PricebookError::Config(format!("invalid filter '{pattern}': {e}")))
}

/// Compiled inclusion filters, full-match semantics.
#[derive(Debug, Clone)]
pub struct Filters {
    pub regions: Regex,
    pub os: Regex,
    pub types: Regex,
}

impl Filters {
    pub fn region_enabled(&self, code: &str) -> bool {
        self.regions.is_match(code)
    }

    pub fn os_enabled(&self, os: &str) -> bool {
        self.os.is_match(os)
    }

    pub fn type_enabled(&self, code: &str) -> bool {
        self.types.is_match(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_match_everything() {
        let filters = SyncConfig::default().compile_filters().unwrap();
        assert!(filters.region_enabled("eu-west-1"));
        assert!(filters.os_enabled("Linux"));
        assert!(filters.type_enabled("c5.xlarge"));
    }

    #[test]
    fn test_region_filter_is_full_match() {
        let config = SyncConfig {
            enabled_regions: "eu-west-1|us-.*".to_string(),
            ..SyncConfig::default()
        };
        let filters = config.compile_filters().unwrap();
        assert!(filters.region_enabled("eu-west-1"));
        assert!(filters.region_enabled("us-east-2"));
        assert!(!filters.region_enabled("eu-west-12"));
        assert!(!filters.region_enabled("ap-south-1"));
    }

    #[test]
    fn test_os_filter_case_insensitive() {
        let config = SyncConfig {
            enabled_os: "linux".to_string(),
            ..SyncConfig::default()
        };
        let filters = config.compile_filters().unwrap();
        assert!(filters.os_enabled("Linux"));
        assert!(!filters.os_enabled("Windows"));
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let config = SyncConfig {
            enabled_types: "(((".to_string(),
            ..SyncConfig::default()
        };
        assert!(config.compile_filters().is_err());
    }
}
