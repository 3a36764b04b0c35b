//! Catalog persistence seam.
//!
//! The engine only talks to the catalog through [`CatalogStore`], so
//! the synchronization logic stays independent of where the catalog
//! actually lives. [`memory::MemoryStore`] is the bundled
//! implementation, also used by every test.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    Price, PriceTerm, QuoteLine, Region, ResourceKind, ResourceType, StoragePrice, StorageType,
    SupportPlan, SupportPrice,
};

/// Read/write access to the persisted catalog.
///
/// Upserts are keyed by entity `code`; deletes are idempotent.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn regions(&self) -> anyhow::Result<Vec<Region>>;
    async fn upsert_region(&self, region: &Region) -> anyhow::Result<()>;

    async fn resource_types(&self, kind: ResourceKind) -> anyhow::Result<Vec<ResourceType>>;
    async fn upsert_resource_type(&self, resource: &ResourceType) -> anyhow::Result<()>;

    async fn terms(&self) -> anyhow::Result<Vec<PriceTerm>>;
    async fn upsert_term(&self, term: &PriceTerm) -> anyhow::Result<()>;

    /// All prices of one kind in one region, the unit of purge work.
    async fn prices(&self, kind: ResourceKind, region: &str) -> anyhow::Result<Vec<Price>>;
    async fn upsert_price(&self, price: &Price) -> anyhow::Result<()>;
    async fn delete_price(&self, code: &str) -> anyhow::Result<()>;

    async fn storage_types(&self) -> anyhow::Result<Vec<StorageType>>;
    async fn upsert_storage_type(&self, storage: &StorageType) -> anyhow::Result<()>;

    async fn storage_prices(&self, region: &str) -> anyhow::Result<Vec<StoragePrice>>;
    async fn upsert_storage_price(&self, price: &StoragePrice) -> anyhow::Result<()>;
    async fn delete_storage_price(&self, code: &str) -> anyhow::Result<()>;

    async fn support_plans(&self) -> anyhow::Result<Vec<SupportPlan>>;
    async fn upsert_support_plan(&self, plan: &SupportPlan) -> anyhow::Result<()>;
    async fn support_prices(&self) -> anyhow::Result<Vec<SupportPrice>>;
    async fn upsert_support_price(&self, price: &SupportPrice) -> anyhow::Result<()>;

    /// Quote lines still referencing a price, checked before purge.
    async fn quote_lines_referencing(&self, price_code: &str) -> anyhow::Result<Vec<QuoteLine>>;
    /// Drop the price reference of a quote line, keeping the line.
    async fn detach_price_reference(&self, line_id: Uuid) -> anyhow::Result<()>;
}
