//! Synchronization orchestrator.
//!
//! Drives a full run: resolve the offer index, seed shared state
//! from the persisted catalog, then walk the offering passes in a
//! fixed order. Storage types are installed before any price can
//! reference them; support has no feed dependency and goes first.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::config::SyncConfig;
use crate::context::{RunContext, SharedCatalog};
use crate::feed::index::OfferIndex;
use crate::feed::FeedClient;
use crate::offering::{compute, container, database, function, storage, support, PassStats};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::store::CatalogStore;
use crate::tables::StaticTables;
use pricebook_common::Result;

/// Offering passes priced per region through the region index.
const PER_REGION_PASSES: u64 = 3;
/// Global work units: storage type seed, support, block, spot,
/// savings plans, function, object, file.
const GLOBAL_PASSES: u64 = 8;

/// Aggregate counters of one synchronization run.
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub regions: usize,
    pub resource_types: usize,
    pub terms: usize,
    pub storage_types: usize,
    pub prices: usize,
    pub storage_prices: usize,
    pub purged: usize,
    pub orphaned_splits: usize,
    pub skipped_rows: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    fn absorb(&mut self, pass: PassStats) {
        self.prices += pass.prices;
        self.storage_prices += pass.storage_prices;
        self.resource_types += pass.types;
        self.purged += pass.purged;
        self.orphaned_splits += pass.orphans;
        self.skipped_rows += pass.skipped_rows;
    }
}

/// The engine's front door.
pub struct Synchronizer {
    config: SyncConfig,
    store: Arc<dyn CatalogStore>,
    tables: Arc<StaticTables>,
    client: FeedClient,
    progress: Arc<ProgressTracker>,
}

impl Synchronizer {
    pub fn new(config: SyncConfig, store: Arc<dyn CatalogStore>) -> Result<Self> {
        let tables = StaticTables::load()?;
        let client = FeedClient::new(&config.base_url)?;
        Ok(Synchronizer {
            config,
            store,
            tables,
            client,
            progress: Arc::new(ProgressTracker::default()),
        })
    }

    /// Live progress of the running (or last) synchronization.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Run one full synchronization. `force` recomputes descriptive
    /// fields on every resolution instead of once per run; writes
    /// stay change-gated either way.
    #[instrument(skip(self))]
    pub async fn synchronize(&self, force: bool) -> anyhow::Result<SyncStats> {
        let started_at = Utc::now();
        let ctx = self.build_context(force).await?;

        let enabled_regions = self
            .tables
            .regions
            .keys()
            .filter(|code| ctx.filters.region_enabled(code))
            .count() as u64;
        ctx.progress
            .set_workload(enabled_regions * PER_REGION_PASSES + GLOBAL_PASSES);

        ctx.progress.set_phase("offer-index");
        let body = self
            .client
            .fetch_text(&self.config.index_path)
            .await
            .context("offer index is mandatory")?;
        let index = OfferIndex::parse(&body)?;

        let mut stats = SyncStats {
            started_at: Some(started_at),
            ..SyncStats::default()
        };

        stats.storage_types = storage::seed_storage_types(&ctx).await?;
        stats.absorb(support::synchronize(&ctx).await?);
        stats.absorb(storage::synchronize_block(&ctx).await?);
        stats.absorb(compute::synchronize(&ctx, &index).await?);
        stats.absorb(database::synchronize(&ctx, &index).await?);
        stats.absorb(container::synchronize(&ctx, &index).await?);
        stats.absorb(function::synchronize(&ctx, &index.version_url("Functions")?).await?);
        stats.absorb(storage::synchronize_object(&ctx, &index.version_url("ObjectStorage")?).await?);
        stats.absorb(storage::synchronize_file(&ctx, &index.version_url("FileStorage")?).await?);

        stats.regions = ctx.shared.regions().touched_count();
        stats.terms = ctx.shared.terms().touched_count();
        stats.finished_at = Some(Utc::now());
        ctx.progress.set_phase("done");
        ctx.progress.set_region(None);
        info!(
            regions = stats.regions,
            types = stats.resource_types,
            terms = stats.terms,
            prices = stats.prices,
            storage_prices = stats.storage_prices,
            purged = stats.purged,
            orphaned = stats.orphaned_splits,
            "synchronization complete"
        );
        Ok(stats)
    }

    async fn build_context(&self, force: bool) -> anyhow::Result<RunContext> {
        let filters = self.config.compile_filters()?;
        let shared = SharedCatalog::seed(
            self.store.regions().await?,
            self.store.terms().await?,
            self.store.storage_types().await?,
        );
        Ok(RunContext {
            force,
            config: self.config.clone(),
            filters,
            tables: Arc::clone(&self.tables),
            store: Arc::clone(&self.store),
            client: self.client.clone(),
            progress: Arc::clone(&self.progress),
            shared: Arc::new(shared),
        })
    }
}
