//! Container offering.
//!
//! Container capacity is priced like instances (per vCPU/memory
//! bundle and hour) from its own per-region feed, with an operating
//! system attribute and no tenancy dimension.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use csv::StringRecord;

use crate::context::RunContext;
use crate::feed::index::OfferIndex;
use crate::feed::tabular::{base_mapping, field, ColumnMap};
use crate::model::{Price, ResourceKind, ResourceType};
use crate::offering::compute::describe_instance_type;
use crate::offering::instance::{run_pass, InstanceOffering, InstanceRow};
use crate::offering::PassStats;

pub struct ContainerOffering;

#[async_trait]
impl InstanceOffering for ContainerOffering {
    fn name(&self) -> &'static str {
        "container"
    }

    fn offer_code(&self) -> &'static str {
        "Container"
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Container
    }

    fn column_mapping(&self) -> HashMap<&'static str, &'static str> {
        let mut mapping = base_mapping();
        mapping.extend([
            ("Instance Type", field::TYPE),
            ("vCPU", field::CPU),
            ("Memory", field::MEMORY),
            ("Network Performance", field::NETWORK),
            ("Current Generation", field::GENERATION),
            ("Operating System", field::OS),
        ]);
        mapping
    }

    fn row_valid(&self, columns: &ColumnMap, record: &StringRecord) -> bool {
        columns.text(record, field::FAMILY) == "Container Instance"
    }

    fn row_enabled(&self, ctx: &RunContext, row: &InstanceRow) -> bool {
        !row.os.is_empty()
            && ctx.filters.os_enabled(&row.os)
            && ctx.filters.type_enabled(&row.type_code)
    }

    fn describe_type(&self, ctx: &RunContext, row: &InstanceRow) -> ResourceType {
        let mut resource = describe_instance_type(ctx, row, ResourceKind::Container);
        resource.auto_scale = true;
        resource
    }

    fn decorate_price(&self, row: &InstanceRow, price: &mut Price) {
        price.os = Some(row.os.clone());
    }
}

pub async fn synchronize(ctx: &RunContext, offers: &OfferIndex) -> anyhow::Result<PassStats> {
    ctx.progress.set_phase("container");
    let (stats, _) = run_pass(ctx, Arc::new(ContainerOffering), offers).await?;
    Ok(stats)
}
