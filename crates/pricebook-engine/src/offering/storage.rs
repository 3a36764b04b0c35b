//! Storage offerings: block volumes, object storage, file storage.
//!
//! Three feed shapes, one outcome: per-GiB monthly prices attached
//! to catalog storage types. The types themselves are seeded from
//! the embedded catalog before any of these passes run, so a price
//! never references a type that does not exist yet.

use std::collections::HashMap;

use csv::StringRecord;
use tracing::{info, warn};

use crate::context::{RegionScope, RunContext};
use crate::feed::index::BlockStorageFeed;
use crate::feed::tabular::{base_mapping, field, ColumnMap, FeedRecord, TabularReader};
use crate::model::{round3, StoragePrice};
use crate::offering::PassStats;
use crate::purge::purge_stale_storage_prices;
use pricebook_common::Result as FeedResult;

/// Install the embedded storage type catalog. Runs once per
/// synchronization, before any price pass.
pub async fn seed_storage_types(ctx: &RunContext) -> anyhow::Result<usize> {
    ctx.progress.set_phase("storage-types");
    let seed = ctx.tables.storage_type_seed.clone();
    let count = seed.len();
    for storage_type in seed {
        ctx.install_storage_type(storage_type).await?;
    }
    ctx.progress.step(1);
    Ok(count)
}

/// Block storage prices from the callback-wrapped all-regions feed.
pub async fn synchronize_block(ctx: &RunContext) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("block-storage");
    let body = ctx.client.fetch_text(&ctx.config.block_storage_path).await?;
    let feed = BlockStorageFeed::parse(&body)?;
    let managed = ctx.tables.storage_codes_for("block");

    let mut stats = PassStats::default();
    for region_entry in feed.config.regions {
        let code = ctx.tables.canonical_region(&region_entry.region).to_string();
        if !ctx.filters.region_enabled(&code) {
            continue;
        }
        let region = ctx.install_region(&code).await?;
        let mut scope =
            RegionScope::load_storage_only(ctx.store.as_ref(), &region.code, &managed).await?;

        for block_type in region_entry.types {
            let Some(type_code) = ctx
                .tables
                .storage_class("block", &block_type.name)
                .map(str::to_string)
            else {
                warn!(name = %block_type.name, "block storage type has no catalog mapping, skipping");
                continue;
            };
            for value in block_type.values {
                // Only the provisioned-capacity dimension is a
                // per-GiB price; IOPS surcharges are not modeled.
                if value.rate == "perPIOPSreq" {
                    continue;
                }
                let Some(cost) = value
                    .prices
                    .get("USD")
                    .and_then(|raw| raw.parse::<f64>().ok())
                else {
                    continue;
                };
                let price_code = format!("{}-{type_code}", region.code);
                let region_code = region.code.clone();
                let type_code = type_code.clone();
                let (price, created) =
                    scope.resolve_storage_price(&price_code, || StoragePrice::new(&price_code));
                let before = if created { None } else { Some(price.clone()) };
                price.type_code = type_code;
                price.region_code = region_code;
                price.cost_gb = round3(cost);
                if before.as_ref() != Some(&*price) {
                    ctx.store.upsert_storage_price(price).await?;
                }
            }
        }
        stats.storage_prices += scope.touched_storage.len();
        stats.purged += purge_stale_storage_prices(ctx.store.as_ref(), &scope).await?;
    }
    ctx.progress.step(1);
    info!(prices = stats.storage_prices, purged = stats.purged, "block storage pass complete");
    Ok(stats)
}

#[derive(Debug, Clone)]
struct StorageRow {
    sku: String,
    amount: f64,
    location: String,
    storage_class: String,
}

impl FeedRecord for StorageRow {
    fn from_record(columns: &ColumnMap, record: &StringRecord) -> FeedResult<Self> {
        Ok(StorageRow {
            sku: columns.text(record, field::SKU),
            amount: columns.number(record, field::PRICE_PER_UNIT)?,
            location: columns.text(record, field::LOCATION),
            storage_class: columns.text(record, field::STORAGE_CLASS),
        })
    }
}

/// Object storage prices from a multi-region tabular feed.
pub async fn synchronize_object(ctx: &RunContext, feed_url: &str) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("object-storage");
    synchronize_tabular_storage(ctx, feed_url, "object").await
}

/// File storage prices from a multi-region tabular feed.
pub async fn synchronize_file(ctx: &RunContext, feed_url: &str) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("file-storage");
    synchronize_tabular_storage(ctx, feed_url, "file").await
}

async fn synchronize_tabular_storage(
    ctx: &RunContext,
    feed_url: &str,
    pass: &'static str,
) -> anyhow::Result<PassStats> {
    let body = ctx.client.fetch_text(feed_url).await?;
    let mut mapping = base_mapping();
    mapping.insert("Storage Class", field::STORAGE_CLASS);
    let mut reader: TabularReader<&[u8], StorageRow> =
        TabularReader::new(body.as_bytes(), mapping, |columns, record| {
            columns.text(record, field::FAMILY) == "Storage"
                && columns.text(record, field::TERM_TYPE) == "OnDemand"
                && columns.text(record, field::PRICE_UNIT) == "GB-Mo"
        })?;

    let managed = ctx.tables.storage_codes_for(pass);
    let mut scopes: HashMap<String, RegionScope> = HashMap::new();
    let mut stats = PassStats::default();

    while let Some(row) = reader.read()? {
        let Some(region_code) = ctx.tables.region_by_name(&row.location).map(str::to_string)
        else {
            warn!(pass, location = %row.location, "storage row for unknown location, skipping");
            continue;
        };
        if !ctx.filters.region_enabled(&region_code) {
            continue;
        }
        let Some(type_code) = ctx
            .tables
            .storage_class(pass, &row.storage_class)
            .map(str::to_string)
        else {
            warn!(pass, class = %row.storage_class, "storage class has no catalog mapping, skipping");
            continue;
        };
        if !scopes.contains_key(&region_code) {
            ctx.install_region(&region_code).await?;
            let scope =
                RegionScope::load_storage_only(ctx.store.as_ref(), &region_code, &managed).await?;
            scopes.insert(region_code.clone(), scope);
        }
        let scope = scopes
            .get_mut(&region_code)
            .ok_or_else(|| anyhow::anyhow!("region scope vanished: {region_code}"))?;

        let (price, created) = scope.resolve_storage_price(&row.sku, || StoragePrice::new(&row.sku));
        let before = if created { None } else { Some(price.clone()) };
        price.type_code = type_code;
        price.region_code = region_code;
        price.cost_gb = round3(row.amount);
        if before.as_ref() != Some(&*price) {
            ctx.store.upsert_storage_price(price).await?;
        }
    }
    stats.skipped_rows = reader.skipped();

    for scope in scopes.values() {
        stats.storage_prices += scope.touched_storage.len();
        stats.purged += purge_stale_storage_prices(ctx.store.as_ref(), scope).await?;
    }
    ctx.progress.step(1);
    info!(pass, prices = stats.storage_prices, purged = stats.purged, "storage pass complete");
    Ok(stats)
}
