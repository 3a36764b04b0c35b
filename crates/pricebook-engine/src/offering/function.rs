//! Serverless function offering.
//!
//! One multi-region tabular feed where rows are billing dimensions
//! (`Duration` per GiB-second, `Requests` per call), not resource
//! types. Rows are aggregated per region into one price per tier
//! carrying a memory cost and a request cost.

use std::collections::{HashMap, HashSet};

use csv::StringRecord;
use tracing::{info, warn};

use crate::context::{RegionScope, RunContext};
use crate::feed::tabular::{base_mapping, field, ColumnMap, FeedRecord, TabularReader};
use crate::model::{round3, Price, ResourceKind, ResourceType, HOURS_PER_MONTH};
use crate::offering::PassStats;
use crate::purge::purge_stale_prices;
use crate::reconcile::derive_term;
use pricebook_common::Result as FeedResult;

const STANDARD_TYPE: &str = "function-standard";
const PROVISIONED_TYPE: &str = "function-provisioned";

#[derive(Debug, Clone)]
struct FunctionRow {
    sku: String,
    term_code: String,
    term_type: String,
    amount: f64,
    location: String,
    group: String,
}

impl FeedRecord for FunctionRow {
    fn from_record(columns: &ColumnMap, record: &StringRecord) -> FeedResult<Self> {
        Ok(FunctionRow {
            sku: columns.text(record, field::SKU),
            term_code: columns.text(record, field::TERM_CODE),
            term_type: columns.text(record, field::TERM_TYPE),
            amount: columns.number(record, field::PRICE_PER_UNIT)?,
            location: columns.text(record, field::LOCATION),
            group: columns.text(record, field::GROUP),
        })
    }
}

/// Billing dimensions of one tier in one region, merged into a
/// single price once both rows showed up.
#[derive(Debug, Default, Clone)]
struct TierAggregate {
    sku: String,
    term_code: String,
    term_type: String,
    cost_gb_second: Option<f64>,
    cost_per_request: Option<f64>,
}

pub async fn synchronize(ctx: &RunContext, feed_url: &str) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("function");
    let body = ctx.client.fetch_text(feed_url).await?;

    let mut mapping = base_mapping();
    mapping.insert("Group", field::GROUP);
    let mut reader: TabularReader<&[u8], FunctionRow> =
        TabularReader::new(body.as_bytes(), mapping, |columns, record| {
            columns.text(record, field::FAMILY) == "Serverless"
                && columns.text(record, field::TERM_TYPE) == "OnDemand"
        })?;

    // region code -> tier type code -> aggregate
    let mut regions: HashMap<String, HashMap<&'static str, TierAggregate>> = HashMap::new();
    while let Some(row) = reader.read()? {
        let Some(region_code) = ctx.tables.region_by_name(&row.location).map(str::to_string)
        else {
            warn!(location = %row.location, "function row for unknown location, skipping");
            continue;
        };
        if !ctx.filters.region_enabled(&region_code) {
            continue;
        }
        let (tier, dimension) = match row.group.as_str() {
            "Duration" => (STANDARD_TYPE, Dimension::Duration),
            "Requests" => (STANDARD_TYPE, Dimension::Requests),
            "Provisioned-Duration" => (PROVISIONED_TYPE, Dimension::Duration),
            "Provisioned-Requests" => (PROVISIONED_TYPE, Dimension::Requests),
            _ => continue,
        };
        let aggregate = regions
            .entry(region_code)
            .or_default()
            .entry(tier)
            .or_default();
        match dimension {
            Dimension::Duration => {
                // The duration row carries the price identity.
                aggregate.sku = row.sku;
                aggregate.term_code = row.term_code;
                aggregate.term_type = row.term_type;
                aggregate.cost_gb_second = Some(row.amount);
            }
            Dimension::Requests => aggregate.cost_per_request = Some(row.amount),
        }
    }
    let skipped = reader.skipped();

    let mut stats = PassStats {
        skipped_rows: skipped,
        ..PassStats::default()
    };
    let mut tiers_seen: HashSet<&'static str> = HashSet::new();
    for (region_code, tiers) in regions {
        let region = ctx.install_region(&region_code).await?;
        let mut scope =
            RegionScope::load(ctx.store.as_ref(), ResourceKind::Function, &region.code).await?;

        for (tier, aggregate) in tiers {
            let Some(gb_second) = aggregate.cost_gb_second else {
                warn!(region = %region.code, tier, "function tier without a duration row, skipping");
                stats.orphans += 1;
                continue;
            };
            let term = ctx
                .install_term(derive_term(&aggregate.term_code, &aggregate.term_type, "", "", ""))
                .await?;
            if tiers_seen.insert(tier) {
                install_tier_type(ctx, tier).await?;
            }

            let region_code = region.code.clone();
            let (price, created) =
                scope.resolve_price(&aggregate.sku, || Price::new(&aggregate.sku, ResourceKind::Function));
            let before = if created { None } else { Some(price.clone()) };
            price.type_code = tier.to_string();
            price.term_code = term.code.clone();
            price.region_code = region_code;
            price.cost = 0.0;
            price.cost_period = 0.0;
            price.initial_cost = 0.0;
            // Monthly cost of one GiB provisioned around the clock.
            price.cost_ram = Some(round3(gb_second * 3600.0 * HOURS_PER_MONTH));
            price.cost_requests = aggregate.cost_per_request.map(|c| round3(c * 1_000_000.0));
            if before.as_ref() != Some(&*price) {
                ctx.store.upsert_price(price).await?;
            }
        }

        stats.prices += scope.touched.len();
        stats.purged += purge_stale_prices(ctx.store.as_ref(), &scope).await?;
    }
    stats.types = tiers_seen.len();
    ctx.progress.step(1);
    info!(prices = stats.prices, purged = stats.purged, "function pass complete");
    Ok(stats)
}

enum Dimension {
    Duration,
    Requests,
}

async fn install_tier_type(ctx: &RunContext, tier: &'static str) -> anyhow::Result<()> {
    // Function tiers are synthetic types without hardware figures.
    let mut described = ResourceType::new(tier, ResourceKind::Function);
    described.name = match tier {
        STANDARD_TYPE => "Function (standard)".to_string(),
        _ => "Function (provisioned concurrency)".to_string(),
    };
    described.auto_scale = true;
    let existing = ctx
        .store
        .resource_types(ResourceKind::Function)
        .await?
        .into_iter()
        .find(|t| t.code == tier);
    if existing.as_ref() != Some(&described) {
        ctx.store.upsert_resource_type(&described).await?;
    }
    Ok(())
}
