//! Merge primitives for shared catalog entities.
//!
//! The engine never writes blindly: an entity is resolved into an
//! in-memory map, its descriptive fields are recomputed at most once
//! per run (always under force), and a store write happens only when
//! the merge observably changed the entity.

use std::collections::{HashMap, HashSet};

/// A code-keyed entity map with touched/merged bookkeeping.
#[derive(Debug)]
pub struct SharedEntities<E> {
    entities: HashMap<String, E>,
    /// Codes seen this run; drives stats and purge arithmetic.
    touched: HashSet<String>,
    /// Codes whose descriptive fields were recomputed this run.
    merged: HashSet<String>,
}

impl<E> Default for SharedEntities<E> {
    fn default() -> Self {
        SharedEntities {
            entities: HashMap::new(),
            touched: HashSet::new(),
            merged: HashSet::new(),
        }
    }
}

impl<E: Clone + PartialEq> SharedEntities<E> {
    pub fn seed(entries: impl IntoIterator<Item = (String, E)>) -> Self {
        SharedEntities {
            entities: entries.into_iter().collect(),
            touched: HashSet::new(),
            merged: HashSet::new(),
        }
    }

    /// Entry-or-insert, then merge-once semantics.
    ///
    /// `merge` runs on the first resolution of `code` this run, or on
    /// every resolution under `force`. Returns a clone of the entity
    /// and whether the caller must write it through to the store.
    pub fn resolve(
        &mut self,
        code: &str,
        force: bool,
        create: impl FnOnce() -> E,
        merge: impl FnOnce(&mut E),
    ) -> (E, bool) {
        let created = !self.entities.contains_key(code);
        let entity = self.entities.entry(code.to_string()).or_insert_with(create);
        self.touched.insert(code.to_string());
        let before = if created { None } else { Some(entity.clone()) };
        if self.merged.insert(code.to_string()) || force {
            merge(entity);
        }
        let write = created || before.as_ref() != Some(&*entity);
        (entity.clone(), write)
    }

    pub fn get(&self, code: &str) -> Option<&E> {
        self.entities.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entities.contains_key(code)
    }

    /// Codes known to the map, touched or not.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Region;

    #[test]
    fn test_resolve_creates_and_writes_once() {
        let mut shared: SharedEntities<Region> = SharedEntities::default();
        let (region, write) = shared.resolve("eu-west-1", false, || Region::new("eu-west-1"), |r| {
            r.name = "EU (Ireland)".to_string();
        });
        assert!(write);
        assert_eq!(region.name, "EU (Ireland)");

        // Second resolution: merge already applied, no change, no write.
        let (_, write) = shared.resolve("eu-west-1", false, || Region::new("eu-west-1"), |r| {
            r.name = "EU (Ireland)".to_string();
        });
        assert!(!write);
        assert_eq!(shared.touched_count(), 1);
    }

    #[test]
    fn test_resolve_seeded_unchanged_entity_skips_write() {
        let mut region = Region::new("eu-west-1");
        region.name = "EU (Ireland)".to_string();
        let mut shared = SharedEntities::seed([("eu-west-1".to_string(), region)]);
        let (_, write) = shared.resolve("eu-west-1", false, || Region::new("eu-west-1"), |r| {
            r.name = "EU (Ireland)".to_string();
        });
        assert!(!write);
    }

    #[test]
    fn test_resolve_seeded_changed_entity_writes() {
        let mut shared = SharedEntities::seed([("eu-west-1".to_string(), Region::new("eu-west-1"))]);
        let (region, write) = shared.resolve("eu-west-1", false, || Region::new("eu-west-1"), |r| {
            r.name = "EU (Ireland)".to_string();
        });
        assert!(write);
        assert_eq!(region.name, "EU (Ireland)");
    }

    #[test]
    fn test_force_reapplies_merge() {
        let mut shared: SharedEntities<Region> = SharedEntities::default();
        let mut name = "first".to_string();
        let (_, _) = shared.resolve("r", true, || Region::new("r"), |r| r.name = name.clone());
        name = "second".to_string();
        let (region, write) = shared.resolve("r", true, || Region::new("r"), |r| r.name = name.clone());
        assert!(write);
        assert_eq!(region.name, "second");
    }
}
