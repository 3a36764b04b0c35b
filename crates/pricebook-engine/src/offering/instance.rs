//! Generic engine for instance-like offerings.
//!
//! Compute, database and container prices share one tabular feed
//! shape: per-region CSVs listed by a region index, rows keyed by
//! SKU and term code, reserved prices split across two rows. The
//! differences (validity rules, price decoration, extra row kinds)
//! live behind [`InstanceOffering`]; the pass itself is written once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::context::{RegionScope, RunContext};
use crate::feed::index::{OfferIndex, RegionIndex};
use crate::feed::tabular::{field, ColumnMap, FeedRecord, TabularReader};
use crate::model::{Price, ResourceKind, ResourceType};
use crate::offering::{PassStats, PLAN_PRICE_PREFIX, SPOT_PRICE_PREFIX};
use crate::purge::{purge_stale_prices, purge_stale_storage_prices};
use crate::reconcile::{
    derive_term, is_split, join_key, reconcile_pair, single_cost, PendingJoins, ReconciledCost,
    SplitHalf,
};
use crate::upsert::SharedEntities;
use pricebook_common::Result as FeedResult;

/// One decoded row of an instance-like tabular feed.
#[derive(Debug, Clone)]
pub struct InstanceRow {
    pub sku: String,
    pub term_code: String,
    pub term_type: String,
    pub price_unit: String,
    pub amount: f64,
    pub lease_length: String,
    pub purchase_option: String,
    pub offering_class: String,
    pub family: String,
    pub type_code: String,
    pub cpu: f64,
    pub memory_mib: u32,
    pub processor: String,
    pub network: String,
    pub current_generation: bool,
    pub storage: String,
    pub tenancy: String,
    pub os: String,
    pub software: String,
    pub license: String,
    pub engine: String,
    pub edition: String,
    pub volume_type: String,
}

impl FeedRecord for InstanceRow {
    fn from_record(columns: &ColumnMap, record: &StringRecord) -> FeedResult<Self> {
        let memory_gib = columns.lenient_number(record, field::MEMORY);
        Ok(InstanceRow {
            sku: columns.text(record, field::SKU),
            term_code: columns.text(record, field::TERM_CODE),
            term_type: columns.text(record, field::TERM_TYPE),
            price_unit: columns.text(record, field::PRICE_UNIT),
            amount: columns.number(record, field::PRICE_PER_UNIT)?,
            lease_length: columns.text(record, field::LEASE_LENGTH),
            purchase_option: columns.text(record, field::PURCHASE_OPTION),
            offering_class: columns.text(record, field::OFFERING_CLASS),
            family: columns.text(record, field::FAMILY),
            type_code: columns.text(record, field::TYPE),
            cpu: columns.lenient_number(record, field::CPU),
            memory_mib: (memory_gib * 1024.0).round() as u32,
            processor: columns.text(record, field::PROCESSOR),
            network: columns.text(record, field::NETWORK),
            current_generation: !columns
                .text(record, field::GENERATION)
                .eq_ignore_ascii_case("No"),
            storage: columns.text(record, field::STORAGE),
            tenancy: columns.text(record, field::TENANCY),
            os: columns.text(record, field::OS),
            software: columns.text(record, field::SOFTWARE),
            license: columns.text(record, field::LICENSE),
            engine: columns.text(record, field::ENGINE),
            edition: columns.text(record, field::EDITION),
            volume_type: columns.text(record, field::VOLUME_TYPE),
        })
    }
}

/// Per-pass shared resource type map and its write-through.
pub type SharedTypes = Arc<Mutex<SharedEntities<ResourceType>>>;

/// The behavior one instance-like offering plugs into the generic
/// pass.
#[async_trait]
pub trait InstanceOffering: Send + Sync + 'static {
    /// Short name used in logs and progress phases.
    fn name(&self) -> &'static str;
    /// Key of this offering in the offer index document.
    fn offer_code(&self) -> &'static str;
    fn kind(&self) -> ResourceKind;

    /// Header label to canonical field map for this feed.
    fn column_mapping(&self) -> HashMap<&'static str, &'static str>;

    /// Cheap pre-decode row filter on the raw record.
    fn row_valid(&self, columns: &ColumnMap, record: &StringRecord) -> bool;

    /// Post-decode filter applying the configured inclusion regexes.
    fn row_enabled(&self, ctx: &RunContext, row: &InstanceRow) -> bool;

    /// Descriptive fields of the row's resource type.
    fn describe_type(&self, ctx: &RunContext, row: &InstanceRow) -> ResourceType;

    /// Offering-specific price attributes (os, engine, tenancy...).
    fn decorate_price(&self, row: &InstanceRow, price: &mut Price);

    /// Stable price identity.
    fn price_code(&self, row: &InstanceRow) -> String {
        format!("{}.{}", row.sku, row.term_code)
    }

    /// Catalog type codes whose storage prices this pass manages;
    /// empty for passes without storage rows.
    fn storage_codes(&self, _ctx: &RunContext) -> HashSet<String> {
        HashSet::new()
    }

    /// Intercept rows that are not instance prices (e.g. database
    /// storage). Returns true when the row was consumed.
    async fn special_row(
        &self,
        _ctx: &RunContext,
        _scope: &mut RegionScope,
        _row: &InstanceRow,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Run one instance-like offering pass: resolve the region index
/// through the offering's offer code, then synchronize every enabled
/// region concurrently.
pub async fn run_pass(
    ctx: &RunContext,
    offering: Arc<dyn InstanceOffering>,
    offers: &OfferIndex,
) -> anyhow::Result<(PassStats, SharedTypes)> {
    let region_index_url = offers.region_index_url(offering.offer_code())?;
    let body = ctx.client.fetch_text(&region_index_url).await?;
    let index = RegionIndex::parse(&body)?;

    let types: SharedTypes = Arc::new(Mutex::new(SharedEntities::seed(
        ctx.store
            .resource_types(offering.kind())
            .await?
            .into_iter()
            .map(|t| (t.code.clone(), t)),
    )));

    let mut handles = Vec::new();
    for entry in index.regions.into_values() {
        let code = ctx.tables.canonical_region(&entry.region_code).to_string();
        if !ctx.filters.region_enabled(&code) {
            debug!(offering = offering.name(), region = %code, "region filtered out");
            continue;
        }
        let ctx = ctx.clone();
        let offering = Arc::clone(&offering);
        let types = Arc::clone(&types);
        let url = entry.current_version_url;
        handles.push(tokio::spawn(async move {
            run_region(&ctx, offering, types, &code, &url).await
        }));
    }

    // Join every region task before surfacing a failure; a dropped
    // handle leaves its task writing in the background.
    let mut joined = Vec::with_capacity(handles.len());
    for handle in handles {
        joined.push(handle.await);
    }
    let mut stats = PassStats::default();
    for result in joined {
        stats.merge(result??);
    }
    stats.types = {
        let types = types.lock().unwrap_or_else(|e| e.into_inner());
        types.touched_count()
    };
    info!(
        offering = offering.name(),
        prices = stats.prices,
        types = stats.types,
        purged = stats.purged,
        "offering pass complete"
    );
    Ok((stats, types))
}

async fn run_region(
    ctx: &RunContext,
    offering: Arc<dyn InstanceOffering>,
    types: SharedTypes,
    region_code: &str,
    url: &str,
) -> anyhow::Result<PassStats> {
    ctx.progress.set_region(Some(region_code));
    // Fetch before touching the catalog so an unreachable feed leaves
    // the region untouched.
    let body = ctx.client.fetch_text(url).await?;
    let region = ctx.install_region(region_code).await?;

    let storage_codes = offering.storage_codes(ctx);
    let mut scope = if storage_codes.is_empty() {
        RegionScope::load(ctx.store.as_ref(), offering.kind(), &region.code).await?
    } else {
        RegionScope::load_with_storage(
            ctx.store.as_ref(),
            offering.kind(),
            &region.code,
            &storage_codes,
        )
        .await?
    };
    // Spot and savings-plan prices live in the same kind/region but
    // come from their own feeds; keep them out of this purge scope.
    scope.previous.retain(|code, _| {
        !code.starts_with(SPOT_PRICE_PREFIX) && !code.starts_with(PLAN_PRICE_PREFIX)
    });

    let valid = {
        let offering = Arc::clone(&offering);
        move |columns: &ColumnMap, record: &StringRecord| offering.row_valid(columns, record)
    };
    let mut reader: TabularReader<&[u8], InstanceRow> =
        TabularReader::new(body.as_bytes(), offering.column_mapping(), valid)?;

    let mut stats = PassStats::default();
    let mut pending: PendingJoins<InstanceRow> = PendingJoins::new();

    while let Some(row) = reader.read()? {
        if offering.special_row(ctx, &mut scope, &row).await? {
            continue;
        }
        if !offering.row_enabled(ctx, &row) {
            stats.skipped_rows += 1;
            continue;
        }
        let term = ctx
            .install_term(derive_term(
                &row.term_code,
                &row.term_type,
                &row.lease_length,
                &row.purchase_option,
                &row.offering_class,
            ))
            .await?;

        install_type(ctx, offering.as_ref(), &types, &row).await?;

        if is_split(&row.term_type, &row.purchase_option) {
            let key = join_key(&row.sku, &row.term_code, &region.code);
            if let Some((first, second)) = pending.offer(key, row) {
                let cost = reconcile_pair(
                    half_of(&first),
                    half_of(&second),
                    term.period,
                )?;
                // Decorate from the hourly half; both halves carry
                // the same descriptive attributes anyway.
                let hourly = if first.price_unit.eq_ignore_ascii_case("Quantity") {
                    second
                } else {
                    first
                };
                save_price(ctx, offering.as_ref(), &mut scope, &hourly, &term.code, cost).await?;
            }
        } else {
            let cost = single_cost(row.amount, term.period);
            save_price(ctx, offering.as_ref(), &mut scope, &row, &term.code, cost).await?;
        }
    }
    stats.skipped_rows += reader.skipped();

    for (key, row) in pending.drain_orphans() {
        warn!(
            offering = offering.name(),
            region = %region.code,
            sku = %row.sku,
            key = %key,
            "split price record never saw its partner row"
        );
        stats.orphans += 1;
    }

    stats.prices = scope.touched.len();
    stats.storage_prices = scope.touched_storage.len();
    stats.purged = purge_stale_prices(ctx.store.as_ref(), &scope).await?;
    if !storage_codes.is_empty() {
        stats.purged += purge_stale_storage_prices(ctx.store.as_ref(), &scope).await?;
    }
    ctx.progress.step(1);
    Ok(stats)
}

fn half_of(row: &InstanceRow) -> SplitHalf {
    SplitHalf {
        one_time: row.price_unit.eq_ignore_ascii_case("Quantity"),
        amount: row.amount,
    }
}

async fn install_type(
    ctx: &RunContext,
    offering: &dyn InstanceOffering,
    types: &SharedTypes,
    row: &InstanceRow,
) -> anyhow::Result<()> {
    let described = offering.describe_type(ctx, row);
    let (resource, write) = {
        let mut types = types.lock().unwrap_or_else(|e| e.into_inner());
        let kind = offering.kind();
        types.resolve(
            &row.type_code,
            ctx.force,
            || ResourceType::new(&row.type_code, kind),
            |t| *t = described.clone(),
        )
    };
    if write {
        ctx.store.upsert_resource_type(&resource).await?;
    }
    Ok(())
}

async fn save_price(
    ctx: &RunContext,
    offering: &dyn InstanceOffering,
    scope: &mut RegionScope,
    row: &InstanceRow,
    term_code: &str,
    cost: ReconciledCost,
) -> anyhow::Result<()> {
    let code = offering.price_code(row);
    let kind = offering.kind();
    let region_code = scope.region_code.clone();
    let (price, created) = scope.resolve_price(&code, || Price::new(&code, kind));
    let before = if created { None } else { Some(price.clone()) };
    price.kind = kind;
    price.type_code = row.type_code.clone();
    price.term_code = term_code.to_string();
    price.region_code = region_code;
    price.cost = cost.per_month;
    price.cost_period = cost.period;
    price.initial_cost = cost.initial;
    offering.decorate_price(row, price);
    if before.as_ref() != Some(&*price) {
        ctx.store.upsert_price(price).await?;
    }
    Ok(())
}

/// Shared helper for post-decode filters: non-empty value matching a
/// configured regex.
pub fn some_text(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
