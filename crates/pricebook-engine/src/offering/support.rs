//! Support plan offering.
//!
//! Support plans are not published in any feed; they come from the
//! embedded catalog and are merged with the same change-gated writes
//! as everything else. Never purged: a vanished plan is a catalog
//! edit, not a feed event.

use std::collections::HashMap;

use tracing::info;

use crate::context::RunContext;
use crate::offering::PassStats;

pub async fn synchronize(ctx: &RunContext) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("support");
    let previous_plans: HashMap<String, _> = ctx
        .store
        .support_plans()
        .await?
        .into_iter()
        .map(|p| (p.code.clone(), p))
        .collect();
    let previous_prices: HashMap<String, _> = ctx
        .store
        .support_prices()
        .await?
        .into_iter()
        .map(|p| (p.code.clone(), p))
        .collect();

    let mut written = 0;
    for plan in &ctx.tables.support_plans {
        if previous_plans.get(&plan.code) != Some(plan) {
            ctx.store.upsert_support_plan(plan).await?;
            written += 1;
        }
    }
    for price in &ctx.tables.support_prices {
        if previous_prices.get(&price.code) != Some(price) {
            ctx.store.upsert_support_price(price).await?;
            written += 1;
        }
    }
    ctx.progress.step(1);
    info!(
        plans = ctx.tables.support_plans.len(),
        prices = ctx.tables.support_prices.len(),
        written,
        "support pass complete"
    );
    // Support prices are their own entity family and do not enter
    // the catalog price counters.
    Ok(PassStats::default())
}
