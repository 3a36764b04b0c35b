//! Purge of prices the feed stopped publishing.
//!
//! At the end of a region unit of work, every previously persisted
//! price the pass did not touch is stale and gets deleted. Quote
//! lines still referencing a stale price have the reference detached
//! first so consumer data survives the deletion.

use tracing::{info, warn};

use crate::context::RegionScope;
use crate::store::CatalogStore;

/// Delete stale prices of the scope. Returns the number purged.
pub async fn purge_stale_prices(
    store: &dyn CatalogStore,
    scope: &RegionScope,
) -> anyhow::Result<usize> {
    let mut purged = 0;
    for code in scope.previous.keys().filter(|c| !scope.touched.contains(*c)) {
        detach_references(store, code).await?;
        store.delete_price(code).await?;
        purged += 1;
    }
    if purged > 0 {
        info!(region = %scope.region_code, purged, "purged stale prices");
    }
    Ok(purged)
}

/// Delete stale storage prices of the scope. Returns the number
/// purged.
pub async fn purge_stale_storage_prices(
    store: &dyn CatalogStore,
    scope: &RegionScope,
) -> anyhow::Result<usize> {
    let mut purged = 0;
    for code in scope
        .previous_storage
        .keys()
        .filter(|c| !scope.touched_storage.contains(*c))
    {
        detach_references(store, code).await?;
        store.delete_storage_price(code).await?;
        purged += 1;
    }
    if purged > 0 {
        info!(region = %scope.region_code, purged, "purged stale storage prices");
    }
    Ok(purged)
}

async fn detach_references(store: &dyn CatalogStore, price_code: &str) -> anyhow::Result<()> {
    for line in store.quote_lines_referencing(price_code).await? {
        warn!(
            price = %price_code,
            quote_line = %line.id,
            "detaching quote line from a price no longer published"
        );
        store.detach_price_reference(line.id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RegionScope;
    use crate::model::{Price, ResourceKind};
    use crate::store::memory::MemoryStore;
    use crate::store::CatalogStore;

    #[tokio::test]
    async fn test_untouched_prices_are_purged() {
        let store = MemoryStore::new();
        for code in ["keep", "stale"] {
            let mut price = Price::new(code, ResourceKind::Instance);
            price.region_code = "eu-west-1".to_string();
            store.upsert_price(&price).await.unwrap();
        }
        let mut scope = RegionScope::load(&store, ResourceKind::Instance, "eu-west-1")
            .await
            .unwrap();
        scope.touched.insert("keep".to_string());

        let purged = purge_stale_prices(&store, &scope).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.price("keep").is_some());
        assert!(store.price("stale").is_none());
    }

    #[tokio::test]
    async fn test_references_are_detached_before_delete() {
        let store = MemoryStore::new();
        let mut price = Price::new("stale", ResourceKind::Instance);
        price.region_code = "eu-west-1".to_string();
        store.upsert_price(&price).await.unwrap();
        let line = store.add_quote_line("old server", "stale");

        let scope = RegionScope::load(&store, ResourceKind::Instance, "eu-west-1")
            .await
            .unwrap();
        purge_stale_prices(&store, &scope).await.unwrap();

        assert!(store.price("stale").is_none());
        let line = store.quote_line(line).unwrap();
        assert!(line.price_code.is_none());
    }

    #[tokio::test]
    async fn test_nothing_stale_means_no_writes() {
        let store = MemoryStore::new();
        let scope = RegionScope::load(&store, ResourceKind::Instance, "eu-west-1")
            .await
            .unwrap();
        let before = store.write_count();
        assert_eq!(purge_stale_prices(&store, &scope).await.unwrap(), 0);
        assert_eq!(store.write_count(), before);
    }
}
