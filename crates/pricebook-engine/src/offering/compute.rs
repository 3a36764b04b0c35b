//! Compute (virtual machine) offering, including the spot market.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::context::{RegionScope, RunContext};
use crate::feed::index::{OfferIndex, SpotFeed};
use crate::feed::tabular::{base_mapping, field, ColumnMap};
use crate::model::{Price, ResourceKind, ResourceType};
use crate::offering::instance::{run_pass, InstanceOffering, InstanceRow, SharedTypes};
use crate::offering::{savings, PassStats, SPOT_PRICE_PREFIX};
use crate::purge::purge_stale_prices;
use crate::rate::apply_ratings;
use crate::reconcile::{single_cost, spot_term};

pub struct ComputeOffering;

#[async_trait]
impl InstanceOffering for ComputeOffering {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn offer_code(&self) -> &'static str {
        "Compute"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Instance
    }

    fn column_mapping(&self) -> HashMap<&'static str, &'static str> {
        let mut mapping = base_mapping();
        mapping.extend([
            ("Instance Type", field::TYPE),
            ("vCPU", field::CPU),
            ("Memory", field::MEMORY),
            ("Physical Processor", field::PROCESSOR),
            ("Network Performance", field::NETWORK),
            ("Current Generation", field::GENERATION),
            ("Storage", field::STORAGE),
            ("Tenancy", field::TENANCY),
            ("Operating System", field::OS),
            ("Pre Installed S/W", field::SOFTWARE),
            ("License Model", field::LICENSE),
            ("CapacityStatus", field::CAPACITY_STATUS),
        ]);
        mapping
    }

    fn row_valid(&self, columns: &ColumnMap, record: &StringRecord) -> bool {
        let family = columns.text(record, field::FAMILY);
        if family != "Compute Instance" {
            return false;
        }
        // Only effectively usable capacity, single-tenant hardware
        // is priced separately and out of scope.
        let capacity = columns.text(record, field::CAPACITY_STATUS);
        if !capacity.is_empty() && capacity != "Used" {
            return false;
        }
        columns.text(record, field::TENANCY) == "Shared"
    }

    fn row_enabled(&self, ctx: &RunContext, row: &InstanceRow) -> bool {
        !row.os.is_empty()
            && ctx.filters.os_enabled(&row.os)
            && ctx.filters.type_enabled(&row.type_code)
    }

    fn describe_type(&self, ctx: &RunContext, row: &InstanceRow) -> ResourceType {
        describe_instance_type(ctx, row, ResourceKind::Instance)
    }

    fn decorate_price(&self, row: &InstanceRow, price: &mut Price) {
        price.os = Some(row.os.clone());
        price.software = crate::offering::instance::some_text(&row.software).map(str::to_string);
        price.license = crate::offering::instance::some_text(&row.license).map(str::to_string);
        price.tenancy = Some(row.tenancy.clone());
    }
}

/// Build an instance-like resource type from a row, ratings applied.
pub fn describe_instance_type(
    ctx: &RunContext,
    row: &InstanceRow,
    kind: ResourceKind,
) -> ResourceType {
    let mut resource = ResourceType::new(&row.type_code, kind);
    resource.cpu = row.cpu;
    resource.ram = row.memory_mib;
    resource.processor = crate::offering::instance::some_text(&row.processor).map(str::to_string);
    resource.current_generation = row.current_generation;
    // Network-only storage does not earn the local-disk bump.
    let local_disks = !row.storage.is_empty() && row.storage != "EBS only";
    apply_ratings(
        &mut resource,
        &ctx.tables.cpu_rates,
        &ctx.tables.ram_rates,
        &ctx.tables.network_rates,
        &ctx.tables.storage_rates,
        &row.network,
        local_disks,
    );
    resource
}

/// Run the compute pass, then its spot market and savings-plan
/// supplements. Plans come last: their rates resolve against the
/// on-demand prices the main pass just installed.
pub async fn synchronize(ctx: &RunContext, offers: &OfferIndex) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("compute");
    let (mut stats, types) = run_pass(ctx, Arc::new(ComputeOffering), offers).await?;
    ctx.progress.set_phase("compute-spot");
    stats.merge(synchronize_spot(ctx, &types).await?);
    ctx.progress.step(1);
    stats.merge(savings::synchronize(ctx, offers).await?);
    Ok(stats)
}

/// Spot market prices: one optional JSON feed covering every region.
/// Only types already known from the regular compute feed are priced.
async fn synchronize_spot(ctx: &RunContext, types: &SharedTypes) -> anyhow::Result<PassStats> {
    let mut stats = PassStats::default();
    let Some(body) = ctx.client.fetch_optional_text(&ctx.config.spot_path).await else {
        return Ok(stats);
    };
    let feed = match SpotFeed::parse(&body) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(error = %e, "spot feed unparsable, skipping");
            return Ok(stats);
        }
    };

    let term = ctx.install_term(spot_term()).await?;
    for region_entry in feed.config.regions {
        let code = ctx.tables.canonical_region(&region_entry.region).to_string();
        if !ctx.filters.region_enabled(&code) {
            continue;
        }
        let region = ctx.install_region(&code).await?;
        let mut scope =
            RegionScope::load(ctx.store.as_ref(), ResourceKind::Instance, &region.code).await?;
        // This feed only owns the spot slice of the region's prices.
        scope
            .previous
            .retain(|price_code, _| price_code.starts_with(SPOT_PRICE_PREFIX));

        for spot_type in region_entry.types {
            let known = {
                let types = types.lock().unwrap_or_else(|e| e.into_inner());
                types.contains(&spot_type.name)
            };
            if !known {
                debug!(region = %region.code, type_code = %spot_type.name,
                    "spot price for unknown type, skipping");
                continue;
            }
            if !ctx.filters.type_enabled(&spot_type.name) {
                continue;
            }
            for os_price in spot_type.os_prices {
                let os = match os_price.name.as_str() {
                    "linux" => "Linux",
                    "mswin" => "Windows",
                    other => other,
                };
                if !ctx.filters.os_enabled(os) {
                    continue;
                }
                let Some(hourly) = os_price
                    .prices
                    .get("USD")
                    .and_then(|raw| raw.parse::<f64>().ok())
                else {
                    // "N/A*" markers mean no capacity is offered.
                    continue;
                };
                let code = format!("{SPOT_PRICE_PREFIX}{}-{}-{os}", region.code, spot_type.name);
                let cost = single_cost(hourly, 0.0);
                let region_code = region.code.clone();
                let (price, created) =
                    scope.resolve_price(&code, || Price::new(&code, ResourceKind::Instance));
                let before = if created { None } else { Some(price.clone()) };
                price.type_code = spot_type.name.clone();
                price.term_code = term.code.clone();
                price.region_code = region_code;
                price.os = Some(os.to_string());
                price.cost = cost.per_month;
                price.cost_period = cost.period;
                price.initial_cost = 0.0;
                if before.as_ref() != Some(&*price) {
                    ctx.store.upsert_price(price).await?;
                }
            }
        }
        stats.prices += scope.touched.len();
        stats.purged += purge_stale_prices(ctx.store.as_ref(), &scope).await?;
    }
    info!(prices = stats.prices, purged = stats.purged, "spot pass complete");
    Ok(stats)
}
