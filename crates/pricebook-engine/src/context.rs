//! Run and region scoped state.
//!
//! A [`RunContext`] is built once per synchronization and cloned into
//! every offering pass and region task; everything inside is shared
//! or cheap. A [`RegionScope`] is built per region unit of work and
//! dropped when the unit completes, keeping previous/touched maps
//! bounded by one region's catalog.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{Filters, SyncConfig};
use crate::feed::FeedClient;
use crate::model::{Price, PriceTerm, Region, ResourceKind, StoragePrice, StorageType};
use crate::progress::ProgressTracker;
use crate::store::CatalogStore;
use crate::tables::StaticTables;
use crate::upsert::SharedEntities;

/// Everything a pass needs, shared across its region tasks.
#[derive(Clone)]
pub struct RunContext {
    pub force: bool,
    pub config: SyncConfig,
    pub filters: Filters,
    pub tables: Arc<StaticTables>,
    pub store: Arc<dyn CatalogStore>,
    pub client: FeedClient,
    pub progress: Arc<ProgressTracker>,
    pub shared: Arc<SharedCatalog>,
}

/// Entities shared across offerings and regions within one run.
///
/// Locks are held only for map work, never across an await.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    regions: Mutex<SharedEntities<Region>>,
    terms: Mutex<SharedEntities<PriceTerm>>,
    storage_types: Mutex<SharedEntities<StorageType>>,
}

impl SharedCatalog {
    pub fn seed(
        regions: impl IntoIterator<Item = Region>,
        terms: impl IntoIterator<Item = PriceTerm>,
        storage_types: impl IntoIterator<Item = StorageType>,
    ) -> Self {
        SharedCatalog {
            regions: Mutex::new(SharedEntities::seed(
                regions.into_iter().map(|r| (r.code.clone(), r)),
            )),
            terms: Mutex::new(SharedEntities::seed(
                terms.into_iter().map(|t| (t.code.clone(), t)),
            )),
            storage_types: Mutex::new(SharedEntities::seed(
                storage_types.into_iter().map(|t| (t.code.clone(), t)),
            )),
        }
    }

    pub fn regions(&self) -> MutexGuard<'_, SharedEntities<Region>> {
        self.regions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn terms(&self) -> MutexGuard<'_, SharedEntities<PriceTerm>> {
        self.terms.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn storage_types(&self) -> MutexGuard<'_, SharedEntities<StorageType>> {
        self.storage_types.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunContext {
    /// Resolve a canonical region code into the shared map, applying
    /// geography on first touch, and write it back when it changed.
    pub async fn install_region(&self, code: &str) -> anyhow::Result<Region> {
        let described = self.tables.describe_region(code);
        let (region, write) = {
            let mut regions = self.shared.regions();
            regions.resolve(code, self.force, || Region::new(code), |region| {
                *region = described.clone();
            })
        };
        if write {
            self.store.upsert_region(&region).await?;
        }
        Ok(region)
    }

    /// Resolve a term into the shared map and write it back when it
    /// changed. The `derived` value carries the descriptive fields.
    pub async fn install_term(&self, derived: PriceTerm) -> anyhow::Result<PriceTerm> {
        let code = derived.code.clone();
        let (term, write) = {
            let mut terms = self.shared.terms();
            terms.resolve(&code, self.force, || PriceTerm::new(&code), |term| {
                *term = derived.clone();
            })
        };
        if write {
            self.store.upsert_term(&term).await?;
        }
        Ok(term)
    }

    /// Resolve a storage type and write it back when it changed.
    pub async fn install_storage_type(
        &self,
        derived: StorageType,
    ) -> anyhow::Result<StorageType> {
        let code = derived.code.clone();
        let (storage, write) = {
            let mut types = self.shared.storage_types();
            types.resolve(&code, self.force, || StorageType::new(&code), |t| {
                *t = derived.clone();
            })
        };
        if write {
            self.store.upsert_storage_type(&storage).await?;
        }
        Ok(storage)
    }
}

/// Previous/touched price state for one region unit of work.
#[derive(Debug, Default)]
pub struct RegionScope {
    pub region_code: String,
    pub previous: HashMap<String, Price>,
    pub touched: HashSet<String>,
    pub previous_storage: HashMap<String, StoragePrice>,
    pub touched_storage: HashSet<String>,
}

impl RegionScope {
    /// Seed the scope from the persisted catalog. Storage prices are
    /// left out: use [`RegionScope::load_with_storage`] for passes
    /// that manage them.
    pub async fn load(
        store: &dyn CatalogStore,
        kind: ResourceKind,
        region_code: &str,
    ) -> anyhow::Result<Self> {
        let previous = store
            .prices(kind, region_code)
            .await?
            .into_iter()
            .map(|p| (p.code.clone(), p))
            .collect();
        Ok(RegionScope {
            region_code: region_code.to_string(),
            previous,
            touched: HashSet::new(),
            previous_storage: HashMap::new(),
            touched_storage: HashSet::new(),
        })
    }

    /// Like [`RegionScope::load`], additionally seeding the storage
    /// prices whose type is one of `storage_codes`. Only those types
    /// take part in this scope's storage purge.
    pub async fn load_with_storage(
        store: &dyn CatalogStore,
        kind: ResourceKind,
        region_code: &str,
        storage_codes: &HashSet<String>,
    ) -> anyhow::Result<Self> {
        let mut scope = Self::load(store, kind, region_code).await?;
        scope.previous_storage = store
            .storage_prices(region_code)
            .await?
            .into_iter()
            .filter(|p| storage_codes.contains(&p.type_code))
            .map(|p| (p.code.clone(), p))
            .collect();
        Ok(scope)
    }

    /// Scope for passes that only manage storage prices.
    pub async fn load_storage_only(
        store: &dyn CatalogStore,
        region_code: &str,
        storage_codes: &HashSet<String>,
    ) -> anyhow::Result<Self> {
        let previous_storage = store
            .storage_prices(region_code)
            .await?
            .into_iter()
            .filter(|p| storage_codes.contains(&p.type_code))
            .map(|p| (p.code.clone(), p))
            .collect();
        Ok(RegionScope {
            region_code: region_code.to_string(),
            previous_storage,
            ..RegionScope::default()
        })
    }

    /// Entry-or-insert with touched marking. Returns the entry and
    /// whether it was created.
    pub fn resolve_price(
        &mut self,
        code: &str,
        create: impl FnOnce() -> Price,
    ) -> (&mut Price, bool) {
        self.touched.insert(code.to_string());
        let created = !self.previous.contains_key(code);
        let price = self.previous.entry(code.to_string()).or_insert_with(create);
        (price, created)
    }

    pub fn resolve_storage_price(
        &mut self,
        code: &str,
        create: impl FnOnce() -> StoragePrice,
    ) -> (&mut StoragePrice, bool) {
        self.touched_storage.insert(code.to_string());
        let created = !self.previous_storage.contains_key(code);
        let price = self
            .previous_storage
            .entry(code.to_string())
            .or_insert_with(create);
        (price, created)
    }
}
