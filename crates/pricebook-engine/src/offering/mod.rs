//! Offering passes.
//!
//! Each submodule synchronizes one offering family. Compute,
//! database and container are instance-like and share the generic
//! engine in [`instance`]; the others have their own feed shapes.

pub mod compute;
pub mod container;
pub mod database;
pub mod function;
pub mod instance;
pub mod savings;
pub mod storage;
pub mod support;

/// Prefix of spot market price codes, keeping them out of the
/// regional CSV purge scope and vice versa.
pub const SPOT_PRICE_PREFIX: &str = "spot-";

/// Prefix of savings-plan price codes, isolating their purge scope
/// the same way.
pub const PLAN_PRICE_PREFIX: &str = "plan-";

/// Counters accumulated by one pass and merged into the run stats.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    /// Prices seen (created, updated or confirmed) by the pass.
    pub prices: usize,
    pub storage_prices: usize,
    /// Resource types seen by the pass.
    pub types: usize,
    /// Stale prices deleted.
    pub purged: usize,
    /// Split records left without a partner at region end.
    pub orphans: usize,
    /// Rows rejected by validity predicates or malformed.
    pub skipped_rows: usize,
}

impl PassStats {
    pub fn merge(&mut self, other: PassStats) {
        self.prices += other.prices;
        self.storage_prices += other.storage_prices;
        self.types += other.types;
        self.purged += other.purged;
        self.orphans += other.orphans;
        self.skipped_rows += other.skipped_rows;
    }
}
