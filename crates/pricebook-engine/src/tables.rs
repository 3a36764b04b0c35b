//! Static reference tables embedded in the binary.
//!
//! Region geography, legacy region renames, feed storage-class
//! mappings, rate tables and the support catalog all ship as JSON
//! assets. They are parsed once at startup and shared behind an `Arc`
//! for the lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::model::{Region, StorageType, SupportPlan, SupportPrice};
use crate::rate::RateTable;
use pricebook_common::Result;

const REGIONS_JSON: &str = include_str!("../assets/regions.json");
const RENAMES_JSON: &str = include_str!("../assets/region-renames.json");
const STORAGE_CLASSES_JSON: &str = include_str!("../assets/storage-classes.json");
const STORAGE_TYPES_JSON: &str = include_str!("../assets/storage-types.json");
const SUPPORT_JSON: &str = include_str!("../assets/support.json");
const RATE_CPU_JSON: &str = include_str!("../assets/rate-cpu.json");
const RATE_RAM_JSON: &str = include_str!("../assets/rate-ram.json");
const RATE_NETWORK_JSON: &str = include_str!("../assets/rate-network.json");
const RATE_STORAGE_JSON: &str = include_str!("../assets/rate-storage.json");

/// Geography attributes of a known region.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionGeo {
    pub name: String,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SupportCatalog {
    plans: Vec<SupportPlan>,
    prices: Vec<SupportPrice>,
}

/// All embedded reference data, loaded once per process.
#[derive(Debug)]
pub struct StaticTables {
    /// Canonical region code to geography.
    pub regions: HashMap<String, RegionGeo>,
    /// Legacy feed region code to canonical code.
    pub region_renames: HashMap<String, String>,
    /// Human region name to canonical code, derived from `regions`.
    region_by_name: HashMap<String, String>,
    /// Feed storage label (prefixed by pass) to catalog type code.
    pub storage_classes: HashMap<String, String>,
    /// Seed storage types installed before any storage pass runs.
    pub storage_type_seed: Vec<StorageType>,
    pub support_plans: Vec<SupportPlan>,
    pub support_prices: Vec<SupportPrice>,
    pub cpu_rates: RateTable,
    pub ram_rates: RateTable,
    pub network_rates: RateTable,
    pub storage_rates: RateTable,
}

impl StaticTables {
    pub fn load() -> Result<Arc<Self>> {
        let regions: HashMap<String, RegionGeo> = serde_json::from_str(REGIONS_JSON)?;
        let region_by_name = regions
            .iter()
            .map(|(code, geo)| (geo.name.clone(), code.clone()))
            .collect();
        let support: SupportCatalog = serde_json::from_str(SUPPORT_JSON)?;
        Ok(Arc::new(StaticTables {
            regions,
            region_renames: serde_json::from_str(RENAMES_JSON)?,
            region_by_name,
            storage_classes: serde_json::from_str(STORAGE_CLASSES_JSON)?,
            storage_type_seed: serde_json::from_str(STORAGE_TYPES_JSON)?,
            support_plans: support.plans,
            support_prices: support.prices,
            cpu_rates: RateTable::from_json(RATE_CPU_JSON)?,
            ram_rates: RateTable::from_json(RATE_RAM_JSON)?,
            network_rates: RateTable::from_json(RATE_NETWORK_JSON)?,
            storage_rates: RateTable::from_json(RATE_STORAGE_JSON)?,
        }))
    }

    /// Map a feed region code to its canonical form, applying the
    /// legacy rename table.
    pub fn canonical_region<'a>(&'a self, code: &'a str) -> &'a str {
        self.region_renames.get(code).map(String::as_str).unwrap_or(code)
    }

    /// Resolve a region from the human readable name used by tabular
    /// feeds, e.g. `EU (Ireland)` to `eu-west-1`.
    pub fn region_by_name(&self, name: &str) -> Option<&str> {
        self.region_by_name.get(name).map(String::as_str)
    }

    /// Build a fully described region for a canonical code. Unknown
    /// codes still yield a region, with the code as its name.
    pub fn describe_region(&self, code: &str) -> Region {
        let mut region = Region::new(code);
        if let Some(geo) = self.regions.get(code) {
            region.name = geo.name.clone();
            region.continent = geo.continent.clone();
            region.country = geo.country.clone();
            region.latitude = geo.latitude;
            region.longitude = geo.longitude;
        }
        region
    }

    /// Map a feed storage label to a catalog storage type code. The
    /// `pass` prefix keeps block, object and database namespaces
    /// apart.
    pub fn storage_class(&self, pass: &str, label: &str) -> Option<&str> {
        self.storage_classes
            .get(&format!("{pass}-{label}"))
            .map(String::as_str)
    }

    /// The catalog storage type codes a pass manages, derived from
    /// its mapping entries. Bounds that pass's purge scope.
    pub fn storage_codes_for(&self, pass: &str) -> std::collections::HashSet<String> {
        let prefix = format!("{pass}-");
        self.storage_classes
            .iter()
            .filter(|(label, _)| label.starts_with(&prefix))
            .map(|(_, code)| code.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_load() {
        let tables = StaticTables::load().unwrap();
        assert!(tables.regions.contains_key("eu-west-1"));
        assert!(!tables.storage_type_seed.is_empty());
        assert!(!tables.support_plans.is_empty());
    }

    #[test]
    fn test_canonical_region_rename() {
        let tables = StaticTables::load().unwrap();
        assert_eq!(tables.canonical_region("eu-ireland"), "eu-west-1");
        assert_eq!(tables.canonical_region("eu-west-1"), "eu-west-1");
        assert_eq!(tables.canonical_region("xx-unknown"), "xx-unknown");
    }

    #[test]
    fn test_region_by_name() {
        let tables = StaticTables::load().unwrap();
        assert_eq!(tables.region_by_name("EU (Ireland)"), Some("eu-west-1"));
        assert_eq!(tables.region_by_name("Atlantis"), None);
    }

    #[test]
    fn test_describe_region_unknown_code() {
        let tables = StaticTables::load().unwrap();
        let region = tables.describe_region("xx-new-1");
        assert_eq!(region.code, "xx-new-1");
        assert_eq!(region.name, "xx-new-1");
        assert!(region.continent.is_none());
    }

    #[test]
    fn test_storage_class_mapping() {
        let tables = StaticTables::load().unwrap();
        assert_eq!(tables.storage_class("block", "Provisioned IOPS"), Some("io1"));
        assert_eq!(tables.storage_class("object", "Archive"), Some("object-archive"));
        assert_eq!(tables.storage_class("block", "Quantum"), None);
    }
}
