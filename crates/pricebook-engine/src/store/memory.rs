//! In-memory catalog store.
//!
//! Keeps every entity in code-keyed maps behind one mutex. The write
//! counter exists for idempotence checks: a second run over unchanged
//! feeds must not produce a single write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::CatalogStore;
use crate::model::{
    Price, PriceTerm, QuoteLine, Region, ResourceKind, ResourceType, StoragePrice, StorageType,
    SupportPlan, SupportPrice,
};

#[derive(Debug, Default)]
struct Inner {
    regions: HashMap<String, Region>,
    types: HashMap<String, ResourceType>,
    terms: HashMap<String, PriceTerm>,
    prices: HashMap<String, Price>,
    storage_types: HashMap<String, StorageType>,
    storage_prices: HashMap<String, StoragePrice>,
    support_plans: HashMap<String, SupportPlan>,
    support_prices: HashMap<String, SupportPrice>,
    quote_lines: HashMap<Uuid, QuoteLine>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Total number of mutating calls since construction.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Attach a quote line to a price, simulating a consumer of the
    /// catalog. Not counted as an engine write.
    pub fn add_quote_line(&self, name: &str, price_code: &str) -> Uuid {
        let id = Uuid::new_v4();
        let line = QuoteLine {
            id,
            name: name.to_string(),
            price_code: Some(price_code.to_string()),
        };
        self.lock().quote_lines.insert(id, line);
        id
    }

    pub fn quote_line(&self, id: Uuid) -> Option<QuoteLine> {
        self.lock().quote_lines.get(&id).cloned()
    }

    pub fn price(&self, code: &str) -> Option<Price> {
        self.lock().prices.get(code).cloned()
    }

    pub fn storage_price(&self, code: &str) -> Option<StoragePrice> {
        self.lock().storage_prices.get(code).cloned()
    }

    pub fn price_count(&self) -> usize {
        self.lock().prices.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn regions(&self) -> anyhow::Result<Vec<Region>> {
        Ok(self.lock().regions.values().cloned().collect())
    }

    async fn upsert_region(&self, region: &Region) -> anyhow::Result<()> {
        self.record_write();
        self.lock().regions.insert(region.code.clone(), region.clone());
        Ok(())
    }

    async fn resource_types(&self, kind: ResourceKind) -> anyhow::Result<Vec<ResourceType>> {
        Ok(self
            .lock()
            .types
            .values()
            .filter(|t| t.kind == kind)
            .cloned()
            .collect())
    }

    async fn upsert_resource_type(&self, resource: &ResourceType) -> anyhow::Result<()> {
        self.record_write();
        self.lock().types.insert(resource.code.clone(), resource.clone());
        Ok(())
    }

    async fn terms(&self) -> anyhow::Result<Vec<PriceTerm>> {
        Ok(self.lock().terms.values().cloned().collect())
    }

    async fn upsert_term(&self, term: &PriceTerm) -> anyhow::Result<()> {
        self.record_write();
        self.lock().terms.insert(term.code.clone(), term.clone());
        Ok(())
    }

    async fn prices(&self, kind: ResourceKind, region: &str) -> anyhow::Result<Vec<Price>> {
        Ok(self
            .lock()
            .prices
            .values()
            .filter(|p| p.kind == kind && p.region_code == region)
            .cloned()
            .collect())
    }

    async fn upsert_price(&self, price: &Price) -> anyhow::Result<()> {
        self.record_write();
        self.lock().prices.insert(price.code.clone(), price.clone());
        Ok(())
    }

    async fn delete_price(&self, code: &str) -> anyhow::Result<()> {
        self.record_write();
        self.lock().prices.remove(code);
        Ok(())
    }

    async fn storage_types(&self) -> anyhow::Result<Vec<StorageType>> {
        Ok(self.lock().storage_types.values().cloned().collect())
    }

    async fn upsert_storage_type(&self, storage: &StorageType) -> anyhow::Result<()> {
        self.record_write();
        self.lock()
            .storage_types
            .insert(storage.code.clone(), storage.clone());
        Ok(())
    }

    async fn storage_prices(&self, region: &str) -> anyhow::Result<Vec<StoragePrice>> {
        Ok(self
            .lock()
            .storage_prices
            .values()
            .filter(|p| p.region_code == region)
            .cloned()
            .collect())
    }

    async fn upsert_storage_price(&self, price: &StoragePrice) -> anyhow::Result<()> {
        self.record_write();
        self.lock()
            .storage_prices
            .insert(price.code.clone(), price.clone());
        Ok(())
    }

    async fn delete_storage_price(&self, code: &str) -> anyhow::Result<()> {
        self.record_write();
        self.lock().storage_prices.remove(code);
        Ok(())
    }

    async fn support_plans(&self) -> anyhow::Result<Vec<SupportPlan>> {
        Ok(self.lock().support_plans.values().cloned().collect())
    }

    async fn support_prices(&self) -> anyhow::Result<Vec<SupportPrice>> {
        Ok(self.lock().support_prices.values().cloned().collect())
    }

    async fn upsert_support_plan(&self, plan: &SupportPlan) -> anyhow::Result<()> {
        self.record_write();
        self.lock()
            .support_plans
            .insert(plan.code.clone(), plan.clone());
        Ok(())
    }

    async fn upsert_support_price(&self, price: &SupportPrice) -> anyhow::Result<()> {
        self.record_write();
        self.lock()
            .support_prices
            .insert(price.code.clone(), price.clone());
        Ok(())
    }

    async fn quote_lines_referencing(&self, price_code: &str) -> anyhow::Result<Vec<QuoteLine>> {
        Ok(self
            .lock()
            .quote_lines
            .values()
            .filter(|l| l.price_code.as_deref() == Some(price_code))
            .cloned()
            .collect())
    }

    async fn detach_price_reference(&self, line_id: Uuid) -> anyhow::Result<()> {
        self.record_write();
        if let Some(line) = self.lock().quote_lines.get_mut(&line_id) {
            line.price_code = None;
        }
        Ok(())
    }
}
