//! Savings-plan prices for the compute offering.
//!
//! An optional index lists one feed endpoint per region; each feed
//! carries plan terms (the commitment) and the discounted hourly
//! rates they grant on individual SKUs. A rate only becomes a price
//! when the discounted SKU already has an on-demand price in the
//! region: type, operating system and tenancy are inherited from it.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::context::{RegionScope, RunContext};
use crate::feed::index::{OfferIndex, SavingsPlanFeed, SavingsPlanIndex};
use crate::model::{Price, ResourceKind};
use crate::offering::{PassStats, PLAN_PRICE_PREFIX, SPOT_PRICE_PREFIX};
use crate::purge::purge_stale_prices;
use crate::reconcile::{savings_plan_term, single_cost};

/// Run the savings-plan pass for the compute offering. The index is
/// optional: an offer without one, or an unreachable one, degrades
/// to zero entries.
pub async fn synchronize(ctx: &RunContext, offers: &OfferIndex) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("compute-plans");
    let mut stats = PassStats::default();
    let Some(index_url) = offers.savings_plan_index_url("Compute") else {
        info!("no savings-plan index published, skipping");
        ctx.progress.step(1);
        return Ok(stats);
    };
    let Some(body) = ctx.client.fetch_optional_text(&index_url).await else {
        ctx.progress.step(1);
        return Ok(stats);
    };
    let index = match SavingsPlanIndex::parse(&body) {
        Ok(index) => index,
        Err(e) => {
            warn!(error = %e, "savings-plan index unparsable, skipping");
            ctx.progress.step(1);
            return Ok(stats);
        }
    };

    for endpoint in index.regions {
        let code = ctx.tables.canonical_region(&endpoint.region_code).to_string();
        if !ctx.filters.region_enabled(&code) {
            continue;
        }
        stats.merge(run_region(ctx, &code, &endpoint.version_url).await?);
    }
    info!(prices = stats.prices, purged = stats.purged, "savings-plan pass complete");
    ctx.progress.step(1);
    Ok(stats)
}

async fn run_region(ctx: &RunContext, region_code: &str, url: &str) -> anyhow::Result<PassStats> {
    ctx.progress.set_region(Some(region_code));
    let mut stats = PassStats::default();
    // A single region's feed failing degrades that region only.
    let Some(body) = ctx.client.fetch_optional_text(url).await else {
        return Ok(stats);
    };
    let feed = match SavingsPlanFeed::parse(&body) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(region = %region_code, error = %e, "savings-plan feed unparsable, skipping");
            return Ok(stats);
        }
    };
    let region = ctx.install_region(region_code).await?;

    let mut scope =
        RegionScope::load(ctx.store.as_ref(), ResourceKind::Instance, &region.code).await?;
    let on_demand = on_demand_by_sku(ctx, &scope);
    if on_demand.is_empty() {
        // Without the on-demand baseline there is nothing to inherit
        // attributes from; existing plan prices are left alone.
        warn!(region = %region.code, "no on-demand prices, savings plans ignored");
        return Ok(stats);
    }
    // This feed only owns the plan slice of the region's prices.
    scope
        .previous
        .retain(|price_code, _| price_code.starts_with(PLAN_PRICE_PREFIX));

    let mut unresolved: Vec<String> = Vec::new();
    for plan in feed.terms.savings_plan {
        let term = ctx
            .install_term(savings_plan_term(
                &plan.sku,
                &plan.description,
                plan.lease_contract_length.duration,
            ))
            .await?;
        for rate in plan.rates {
            // Unused-capacity dimensions bill idle commitment, not a
            // resource.
            if rate.discounted_usage_type.contains("Unused") {
                continue;
            }
            let Some(base) = on_demand.get(rate.discounted_sku.as_str()) else {
                unresolved.push(rate.discounted_sku);
                continue;
            };
            let code = format!("{PLAN_PRICE_PREFIX}{}", rate.rate_code);
            let cost = single_cost(rate.discounted_rate.price, term.period);
            let region_code = region.code.clone();
            let base = base.clone();
            let (price, created) =
                scope.resolve_price(&code, || Price::new(&code, ResourceKind::Instance));
            let before = if created { None } else { Some(price.clone()) };
            price.kind = ResourceKind::Instance;
            price.type_code = base.type_code;
            price.term_code = term.code.clone();
            price.region_code = region_code;
            price.cost = cost.per_month;
            price.cost_period = cost.period;
            price.initial_cost = 0.0;
            price.os = base.os;
            price.software = base.software;
            price.license = base.license;
            price.tenancy = base.tenancy;
            if before.as_ref() != Some(&*price) {
                ctx.store.upsert_price(price).await?;
            }
        }
    }
    if let Some(first) = unresolved.first() {
        warn!(
            region = %region.code,
            count = unresolved.len(),
            first = %first,
            "savings-plan rates reference SKUs without an on-demand price"
        );
        stats.skipped_rows += unresolved.len();
    }

    stats.prices = scope.touched.len();
    stats.purged = purge_stale_prices(ctx.store.as_ref(), &scope).await?;
    Ok(stats)
}

/// The region's on-demand compute prices keyed by SKU, extracted
/// from a freshly loaded scope. A price is on-demand when its term
/// carries no commitment: not reserved, not variable, zero period.
fn on_demand_by_sku(ctx: &RunContext, scope: &RegionScope) -> HashMap<String, Price> {
    let terms = ctx.shared.terms();
    scope
        .previous
        .values()
        .filter(|p| {
            !p.code.starts_with(SPOT_PRICE_PREFIX) && !p.code.starts_with(PLAN_PRICE_PREFIX)
        })
        .filter(|p| {
            terms
                .get(&p.term_code)
                .is_some_and(|t| !t.reservation && !t.variable && t.period == 0.0)
        })
        .filter_map(|p| {
            p.code
                .split_once('.')
                .map(|(sku, _)| (sku.to_string(), p.clone()))
        })
        .collect()
}
