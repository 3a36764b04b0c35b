//! Catalog entity model.
//!
//! All entities carry a stable `code` used as the identity for lookups,
//! merge decisions and purge set arithmetic. Structural equality
//! (`PartialEq`) is what gates persistence writes: an entity is only
//! written back when a merge actually changed it.

use serde::{Deserialize, Serialize};

/// Hours billed per month by the upstream catalog (24h x 30.5 days).
pub const HOURS_PER_MONTH: f64 = 24.0 * 30.5;

/// Round a cost to three decimals, the upstream catalog's precision.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Relative quality rating on a five step scale.
///
/// Ordering is meaningful: `Worst < Low < Medium < Good < Best`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Worst,
    Low,
    Medium,
    Good,
    Best,
}

impl Rating {
    /// One step better, saturating at `Best`.
    pub fn up(self) -> Rating {
        match self {
            Rating::Worst => Rating::Low,
            Rating::Low => Rating::Medium,
            Rating::Medium => Rating::Good,
            Rating::Good | Rating::Best => Rating::Best,
        }
    }

    /// One step worse, saturating at `Worst`.
    pub fn down(self) -> Rating {
        match self {
            Rating::Best => Rating::Good,
            Rating::Good => Rating::Medium,
            Rating::Medium => Rating::Low,
            Rating::Low | Rating::Worst => Rating::Worst,
        }
    }
}

impl Default for Rating {
    fn default() -> Self {
        Rating::Medium
    }
}

/// The kind of priced resource a type or price belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Instance,
    Database,
    Container,
    Function,
}

/// A deployment region with its geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Canonical API code, e.g. `eu-west-1`.
    pub code: String,
    /// Human readable name as it appears in tabular feeds.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Region {
    pub fn new(code: &str) -> Self {
        Region {
            code: code.to_string(),
            name: code.to_string(),
            continent: None,
            country: None,
            latitude: None,
            longitude: None,
        }
    }
}

/// A purchasable resource type (instance size, database class, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceType {
    pub code: String,
    pub kind: ResourceKind,
    pub name: String,
    pub cpu: f64,
    /// Memory in MiB.
    pub ram: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub current_generation: bool,
    pub auto_scale: bool,
    pub cpu_rate: Rating,
    pub ram_rate: Rating,
    pub network_rate: Rating,
    pub storage_rate: Rating,
}

impl ResourceType {
    pub fn new(code: &str, kind: ResourceKind) -> Self {
        ResourceType {
            code: code.to_string(),
            kind,
            name: code.to_string(),
            cpu: 0.0,
            ram: 0,
            processor: None,
            description: None,
            current_generation: true,
            auto_scale: false,
            cpu_rate: Rating::Medium,
            ram_rate: Rating::Medium,
            network_rate: Rating::Medium,
            storage_rate: Rating::Medium,
        }
    }
}

/// A billing term: on-demand, a reservation flavor, or the spot market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTerm {
    pub code: String,
    pub name: String,
    /// Commitment length in months, `0` for on-demand and spot.
    pub period: f64,
    /// Whether the term involves an upfront payment.
    pub upfront: bool,
    pub reservation: bool,
    pub convertible_type: bool,
    pub convertible_family: bool,
    pub convertible_os: bool,
    pub convertible_engine: bool,
    pub convertible_location: bool,
    /// Variable (market driven) pricing, i.e. spot.
    pub variable: bool,
    /// Capacity may be reclaimed by the provider.
    pub ephemeral: bool,
}

impl PriceTerm {
    pub fn new(code: &str) -> Self {
        PriceTerm {
            code: code.to_string(),
            name: code.to_string(),
            period: 0.0,
            upfront: false,
            reservation: false,
            convertible_type: false,
            convertible_family: false,
            convertible_os: false,
            convertible_engine: false,
            convertible_location: false,
            variable: false,
            ephemeral: false,
        }
    }
}

/// A resource price in one region under one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Stable identity, derived from the feed rate code.
    pub code: String,
    pub kind: ResourceKind,
    pub type_code: String,
    pub term_code: String,
    pub region_code: String,
    /// Effective monthly cost, upfront amortized over the period.
    pub cost: f64,
    /// Total cost over the whole commitment period.
    pub cost_period: f64,
    /// One-time upfront payment.
    pub initial_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    /// Monthly cost of one GiB of memory, for function offerings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_ram: Option<f64>,
    /// Cost of one million invocations, for function offerings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_requests: Option<f64>,
}

impl Price {
    pub fn new(code: &str, kind: ResourceKind) -> Self {
        Price {
            code: code.to_string(),
            kind,
            type_code: String::new(),
            term_code: String::new(),
            region_code: String::new(),
            cost: 0.0,
            cost_period: 0.0,
            initial_cost: 0.0,
            os: None,
            software: None,
            license: None,
            tenancy: None,
            engine: None,
            edition: None,
            cost_ram: None,
            cost_requests: None,
        }
    }
}

/// A storage offering (block volume class, object tier, file share).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageType {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latency: Rating,
    /// Resource kind this storage can attach to, when restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized: Option<String>,
    /// Availability in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,
    /// Durability expressed as a number of nines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability9: Option<u32>,
    /// Database engine restriction, when storage is engine bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Minimal size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal: Option<u32>,
    /// Maximal size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximal: Option<u32>,
}

impl StorageType {
    pub fn new(code: &str) -> Self {
        StorageType {
            code: code.to_string(),
            name: code.to_string(),
            description: None,
            latency: Rating::Medium,
            optimized: None,
            availability: None,
            durability9: None,
            engine: None,
            minimal: None,
            maximal: None,
        }
    }
}

/// The per-GiB monthly price of a storage type in a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePrice {
    pub code: String,
    pub type_code: String,
    pub region_code: String,
    /// Monthly cost of one GiB.
    pub cost_gb: f64,
}

impl StoragePrice {
    pub fn new(code: &str) -> Self {
        StoragePrice {
            code: code.to_string(),
            type_code: String::new(),
            region_code: String::new(),
            cost_gb: 0.0,
        }
    }
}

/// A support plan of the provider, a global (region-less) offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportPlan {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Guaranteed response time for a blocking incident, in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_hours: Option<u32>,
    pub access_api: bool,
    pub access_chat: bool,
    pub access_phone: bool,
}

/// The price of a support plan: a flat monthly fee plus a percentage
/// of the monthly bill above a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportPrice {
    pub code: String,
    pub plan_code: String,
    /// Minimal monthly fee.
    pub cost: f64,
    /// Percentage of the monthly bill, 0-100.
    pub rate: u32,
    /// Bill threshold above which `rate` applies.
    pub threshold: f64,
}

/// A consumer-side quotation line holding a reference to a price.
///
/// The engine never creates these; it only detaches their price
/// reference before purging a stale price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub id: uuid::Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round3() {
        assert_eq!(round3(156.0564), 156.056);
        assert_eq!(round3(4.3349), 4.335);
        assert_eq!(round3(0.0), 0.0);
    }

    #[test]
    fn test_rating_order() {
        assert!(Rating::Worst < Rating::Low);
        assert!(Rating::Good < Rating::Best);
        assert_eq!(Rating::Best.up(), Rating::Best);
        assert_eq!(Rating::Worst.down(), Rating::Worst);
        assert_eq!(Rating::Medium.up(), Rating::Good);
        assert_eq!(Rating::Medium.down(), Rating::Low);
    }

    #[test]
    fn test_bare_entities_compare_equal() {
        assert_eq!(Price::new("p1", ResourceKind::Instance), Price::new("p1", ResourceKind::Instance));
        assert_ne!(Region::new("eu-west-1"), Region::new("eu-west-2"));
    }
}
