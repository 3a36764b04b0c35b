//! Structured feed documents: offer index, per-offer region index,
//! and the all-regions JSON feeds (spot market, block storage).
//!
//! Some endpoints serve JSON wrapped in a JavaScript callback
//! envelope. [`unwrap_envelope`] strips it by cutting from the first
//! `{` to the last `}` of the body.

use std::collections::HashMap;

use serde::Deserialize;

use pricebook_common::{PricebookError, Result};

/// Strip a `callback({...});` envelope, returning the bare JSON
/// object. A plain JSON body passes through unchanged.
pub fn unwrap_envelope(body: &str) -> Result<&str> {
    let start = body
        .find('{')
        .ok_or_else(|| PricebookError::Parse("no JSON object in feed body".to_string()))?;
    let end = body
        .rfind('}')
        .ok_or_else(|| PricebookError::Parse("unterminated JSON object in feed body".to_string()))?;
    if end < start {
        return Err(PricebookError::Parse(
            "unterminated JSON object in feed body".to_string(),
        ));
    }
    Ok(&body[start..=end])
}

/// Top-level offer index: one entry per offering family.
#[derive(Debug, Deserialize)]
pub struct OfferIndex {
    pub offers: HashMap<String, Offer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Single multi-region tabular feed, when the offer has one.
    #[serde(default)]
    pub current_version_url: Option<String>,
    /// Per-region feed index, for offers split by region.
    #[serde(default)]
    pub current_region_index_url: Option<String>,
    /// Per-region savings-plan endpoints; absent for offers without
    /// a discount-plan market.
    #[serde(default)]
    pub savings_plan_index_url: Option<String>,
}

impl OfferIndex {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }

    pub fn offer(&self, code: &str) -> Result<&Offer> {
        self.offers
            .get(code)
            .ok_or_else(|| PricebookError::UnknownOffering(code.to_string()))
    }

    /// Region index URL of an offer published region by region.
    pub fn region_index_url(&self, code: &str) -> Result<String> {
        self.offer(code)?
            .current_region_index_url
            .clone()
            .ok_or_else(|| {
                PricebookError::UnknownOffering(format!("{code}: no region index URL"))
            })
    }

    /// Feed URL of an offer published as a single document.
    pub fn version_url(&self, code: &str) -> Result<String> {
        self.offer(code)?
            .current_version_url
            .clone()
            .ok_or_else(|| PricebookError::UnknownOffering(format!("{code}: no feed URL")))
    }

    /// Savings-plan index URL of an offer, when it publishes one.
    pub fn savings_plan_index_url(&self, code: &str) -> Option<String> {
        self.offers
            .get(code)
            .and_then(|offer| offer.savings_plan_index_url.clone())
    }
}

/// Per-offer region index: region code to regional feed URL.
#[derive(Debug, Deserialize)]
pub struct RegionIndex {
    pub regions: HashMap<String, RegionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    pub region_code: String,
    pub current_version_url: String,
}

impl RegionIndex {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }
}

/// Savings-plan index: one feed endpoint per region.
#[derive(Debug, Deserialize)]
pub struct SavingsPlanIndex {
    pub regions: Vec<SavingsPlanEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanEndpoint {
    pub region_code: String,
    pub version_url: String,
}

impl SavingsPlanIndex {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }
}

/// Per-region savings-plan feed: plan terms wrapping the discounted
/// hourly rates of individual SKUs.
#[derive(Debug, Deserialize)]
pub struct SavingsPlanFeed {
    pub terms: SavingsPlanTerms,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanTerms {
    pub savings_plan: Vec<SavingsPlanTerm>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanTerm {
    pub sku: String,
    pub description: String,
    pub lease_contract_length: SavingsPlanLease,
    #[serde(default)]
    pub rates: Vec<SavingsPlanRate>,
}

#[derive(Debug, Deserialize)]
pub struct SavingsPlanLease {
    /// Commitment length in years.
    pub duration: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanRate {
    /// SKU of the on-demand price this rate discounts.
    pub discounted_sku: String,
    /// Usage dimension; `Unused` variants bill reserved-but-idle
    /// capacity and are not catalog prices.
    pub discounted_usage_type: String,
    /// Stable identity of the discounted price.
    pub rate_code: String,
    pub discounted_rate: SavingsPlanAmount,
}

#[derive(Debug, Deserialize)]
pub struct SavingsPlanAmount {
    /// Discounted hourly price.
    pub price: f64,
}

impl SavingsPlanFeed {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }
}

/// Spot market feed: one document covering every region.
#[derive(Debug, Deserialize)]
pub struct SpotFeed {
    pub config: SpotConfig,
}

#[derive(Debug, Deserialize)]
pub struct SpotConfig {
    pub regions: Vec<SpotRegion>,
}

#[derive(Debug, Deserialize)]
pub struct SpotRegion {
    /// May be a legacy code needing the rename table.
    pub region: String,
    #[serde(rename = "instanceTypes")]
    pub types: Vec<SpotType>,
}

#[derive(Debug, Deserialize)]
pub struct SpotType {
    pub name: String,
    #[serde(rename = "osPrices", default)]
    pub os_prices: Vec<SpotOsPrice>,
}

#[derive(Debug, Deserialize)]
pub struct SpotOsPrice {
    /// Operating system label, e.g. `linux` or `mswin`.
    pub name: String,
    /// Currency code to hourly price; non-numeric means unavailable.
    #[serde(default)]
    pub prices: HashMap<String, String>,
}

impl SpotFeed {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }
}

/// Block storage feed: callback-wrapped, one document covering every
/// region.
#[derive(Debug, Deserialize)]
pub struct BlockStorageFeed {
    pub config: BlockStorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct BlockStorageConfig {
    pub regions: Vec<BlockStorageRegion>,
}

#[derive(Debug, Deserialize)]
pub struct BlockStorageRegion {
    /// May be a legacy code needing the rename table.
    pub region: String,
    pub types: Vec<BlockStorageType>,
}

#[derive(Debug, Deserialize)]
pub struct BlockStorageType {
    /// Feed label, mapped to a catalog type through the static
    /// storage-class table.
    pub name: String,
    pub values: Vec<BlockStorageValue>,
}

#[derive(Debug, Deserialize)]
pub struct BlockStorageValue {
    /// Billing dimension, e.g. `perGBmoProvStorage` or `perPIOPSreq`.
    pub rate: String,
    /// Currency code to price per unit.
    #[serde(default)]
    pub prices: HashMap<String, String>,
}

impl BlockStorageFeed {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(unwrap_envelope(body)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_envelope_callback() {
        let body = "callback({\"a\": {\"b\": 1}});";
        assert_eq!(unwrap_envelope(body).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_unwrap_envelope_plain_json() {
        let body = "{\"a\": 1}";
        assert_eq!(unwrap_envelope(body).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_unwrap_envelope_rejects_non_json() {
        assert!(unwrap_envelope("<html>gone</html>").is_err());
        assert!(unwrap_envelope("} {").is_err());
    }

    #[test]
    fn test_offer_index_parse() {
        let body = r#"{"offers": {"Compute": {"currentRegionIndexUrl": "/offers/compute/region_index.json", "savingsPlanIndexUrl": "/plans/region_index.json"}, "ObjectStorage": {"currentVersionUrl": "/offers/object/index.csv"}}}"#;
        let index = OfferIndex::parse(body).unwrap();
        assert_eq!(
            index.region_index_url("Compute").unwrap(),
            "/offers/compute/region_index.json"
        );
        assert_eq!(
            index.version_url("ObjectStorage").unwrap(),
            "/offers/object/index.csv"
        );
        assert_eq!(
            index.savings_plan_index_url("Compute").as_deref(),
            Some("/plans/region_index.json")
        );
        assert_eq!(index.savings_plan_index_url("ObjectStorage"), None);
        assert!(matches!(
            index.offer("Quantum"),
            Err(PricebookError::UnknownOffering(_))
        ));
        // A region-indexed offer has no single feed URL and vice versa.
        assert!(index.version_url("Compute").is_err());
        assert!(index.region_index_url("ObjectStorage").is_err());
    }

    #[test]
    fn test_savings_plan_feed_parse() {
        let body = r#"{"regions": [{"regionCode": "eu-west-1", "versionUrl": "/plans/eu-west-1.json"}]}"#;
        let index = SavingsPlanIndex::parse(body).unwrap();
        assert_eq!(index.regions[0].region_code, "eu-west-1");

        let body = r#"{"terms": {"savingsPlan": [{
            "sku": "PLAN1",
            "description": "3 year No Upfront Compute Savings Plan",
            "leaseContractLength": {"duration": 3},
            "rates": [{
                "discountedSku": "SKUC5X",
                "discountedUsageType": "BoxUsage:c5.xlarge",
                "rateCode": "PLAN1.SKUC5X.RATE",
                "discountedRate": {"price": 0.16}
            }]
        }]}}"#;
        let feed = SavingsPlanFeed::parse(body).unwrap();
        let term = &feed.terms.savings_plan[0];
        assert_eq!(term.lease_contract_length.duration, 3);
        assert_eq!(term.rates[0].discounted_rate.price, 0.16);
    }

    #[test]
    fn test_spot_feed_parse_with_envelope() {
        let body = r#"callback({"config": {"regions": [{"region": "eu-ireland", "instanceTypes": [{"name": "c5.large", "osPrices": [{"name": "linux", "prices": {"USD": "0.035"}}]}]}]}});"#;
        let feed = SpotFeed::parse(body).unwrap();
        assert_eq!(feed.config.regions[0].region, "eu-ireland");
        assert_eq!(feed.config.regions[0].types[0].os_prices[0].prices["USD"], "0.035");
    }
}
