//! Managed database offering.
//!
//! The database feed mixes two row kinds: `Database Instance` rows
//! are regular instance-like prices, and `Database Storage` rows are
//! per-GiB storage prices handled as a special row.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use csv::StringRecord;
use tracing::warn;

use crate::context::{RegionScope, RunContext};
use crate::feed::index::OfferIndex;
use crate::feed::tabular::{base_mapping, field, ColumnMap};
use crate::model::{round3, Price, ResourceKind, ResourceType, StoragePrice};
use crate::offering::compute::describe_instance_type;
use crate::offering::instance::{run_pass, some_text, InstanceOffering, InstanceRow};
use crate::offering::PassStats;

pub struct DatabaseOffering;

#[async_trait]
impl InstanceOffering for DatabaseOffering {
    fn name(&self) -> &'static str {
        "database"
    }

    fn offer_code(&self) -> &'static str {
        "Database"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
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
            ("Deployment Option", field::DEPLOYMENT),
            ("Database Engine", field::ENGINE),
            ("Database Edition", field::EDITION),
            ("Volume Type", field::VOLUME_TYPE),
            ("License Model", field::LICENSE),
        ]);
        mapping
    }

    fn row_valid(&self, columns: &ColumnMap, record: &StringRecord) -> bool {
        let family = columns.text(record, field::FAMILY);
        family == "Database Instance" || family == "Database Storage"
    }

    fn row_enabled(&self, ctx: &RunContext, row: &InstanceRow) -> bool {
        !row.engine.is_empty() && ctx.filters.type_enabled(&row.type_code)
    }

    fn describe_type(&self, ctx: &RunContext, row: &InstanceRow) -> ResourceType {
        describe_instance_type(ctx, row, ResourceKind::Database)
    }

    fn decorate_price(&self, row: &InstanceRow, price: &mut Price) {
        price.engine = Some(row.engine.clone());
        price.edition = some_text(&row.edition).map(str::to_string);
        price.license = some_text(&row.license).map(str::to_string);
    }

    fn storage_codes(&self, ctx: &RunContext) -> HashSet<String> {
        ctx.tables.storage_codes_for("db")
    }

    async fn special_row(
        &self,
        ctx: &RunContext,
        scope: &mut RegionScope,
        row: &InstanceRow,
    ) -> anyhow::Result<bool> {
        if row.family != "Database Storage" {
            return Ok(false);
        }
        // Aurora storage is engine-bound and mapped separately.
        let label = if row.engine.eq_ignore_ascii_case("Aurora") {
            format!("{}-Aurora", row.volume_type)
        } else {
            row.volume_type.clone()
        };
        let Some(type_code) = ctx.tables.storage_class("db", &label).map(str::to_string) else {
            warn!(volume = %row.volume_type, engine = %row.engine,
                "database storage volume has no catalog mapping, skipping");
            return Ok(true);
        };
        let region_code = scope.region_code.clone();
        let (price, created) = scope.resolve_storage_price(&row.sku, || StoragePrice::new(&row.sku));
        let before = if created { None } else { Some(price.clone()) };
        price.type_code = type_code;
        price.region_code = region_code;
        price.cost_gb = round3(row.amount);
        if before.as_ref() != Some(&*price) {
            ctx.store.upsert_storage_price(price).await?;
        }
        Ok(true)
    }
}

pub async fn synchronize(ctx: &RunContext, offers: &OfferIndex) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("database");
    let (stats, _) = run_pass(ctx, Arc::new(DatabaseOffering), offers).await?;
    Ok(stats)
}
