//! Rating inference for resource types.
//!
//! Feeds never carry quality ratings, so they are inferred from a
//! static table keyed by type code with family-prefix fallback: a
//! lookup for `c5d.xlarge` tries `c5d.xlarge`, then `c5d`, then
//! `c5`, then `c` before giving up on the table's default.

use std::collections::HashMap;

use crate::model::{Rating, ResourceType};
use pricebook_common::Result;

/// One rating dimension (cpu, ram, network or storage).
#[derive(Debug, Clone)]
pub struct RateTable {
    ratings: HashMap<String, Rating>,
    default: Rating,
}

impl RateTable {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut ratings: HashMap<String, Rating> = serde_json::from_str(json)?;
        let default = ratings.remove("default").unwrap_or(Rating::Medium);
        Ok(RateTable { ratings, default })
    }

    /// Look up a rating with family-prefix fallback.
    pub fn rate(&self, code: &str) -> Rating {
        if let Some(rating) = self.ratings.get(code) {
            return *rating;
        }
        // Family token, then progressively shorter prefixes of it.
        // Prefixes are cut at char boundaries only; type codes are
        // not guaranteed ASCII.
        let family = code.split('.').next().unwrap_or(code);
        let mut len = family.len();
        while len > 0 {
            if family.is_char_boundary(len) {
                if let Some(rating) = self.ratings.get(&family[..len]) {
                    return *rating;
                }
            }
            len -= 1;
        }
        self.default
    }

    /// An exact-label lookup without prefix fallback, for dimensions
    /// keyed by descriptive labels rather than type codes.
    pub fn rate_label(&self, label: &str) -> Rating {
        self.ratings.get(label).copied().unwrap_or(self.default)
    }
}

/// Apply the rating tables to a freshly resolved type.
///
/// Previous-generation hardware is rated one step down on every
/// dimension. Types with local disks (anything but network-only
/// storage) get a storage bump.
pub fn apply_ratings(
    resource: &mut ResourceType,
    cpu: &RateTable,
    ram: &RateTable,
    network: &RateTable,
    storage: &RateTable,
    network_label: &str,
    local_disks: bool,
) {
    let key = resource.code.strip_prefix("db.").unwrap_or(&resource.code);
    resource.cpu_rate = cpu.rate(key);
    resource.ram_rate = ram.rate(key);
    resource.network_rate = network.rate_label(network_label);
    resource.storage_rate = storage.rate(key);
    if local_disks {
        resource.storage_rate = resource.storage_rate.up();
    }
    if !resource.current_generation {
        resource.cpu_rate = resource.cpu_rate.down();
        resource.ram_rate = resource.ram_rate.down();
        resource.network_rate = resource.network_rate.down();
        resource.storage_rate = resource.storage_rate.down();
    }
}
