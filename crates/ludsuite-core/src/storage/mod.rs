//! # Registry Storage
//!
//! Storage backends for the registry.
//!
//! The store only sees collections of encoded rows keyed by `u64`, plus the
//! endorser-mentor join table. Typed access lives in
//! [`crate::directory::Directory`]. Every mutation is a [`WriteBatch`] that
//! the backend applies as one unit: either all of it lands or none of it does.
//!
//! Two backends implement [`RegistryStore`]:
//! - [`MemoryStore`]: `BTreeMap`s, volatile
//! - [`RedbStore`]: redb tables, ACID and persistent

mod redb_store;

pub use redb_store::RedbStore;

use crate::{EndorserLink, LudError, UserId};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// COLLECTIONS
// =============================================================================

/// A keyed collection of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Users,
    Mentees,
    Assignments,
    Activities,
    Objectives,
    YearPlan,
    Assessments,
    Notifications,
    WorkSchedule,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Mentees,
        Collection::Assignments,
        Collection::Activities,
        Collection::Objectives,
        Collection::YearPlan,
        Collection::Assessments,
        Collection::Notifications,
        Collection::WorkSchedule,
    ];

    /// Table name used by persistent backends.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Mentees => "mentees",
            Collection::Assignments => "assignments",
            Collection::Activities => "activities",
            Collection::Objectives => "objectives",
            Collection::YearPlan => "year_plan",
            Collection::Assessments => "assessments",
            Collection::Notifications => "notifications",
            Collection::WorkSchedule => "work_schedule",
        }
    }
}

// =============================================================================
// WRITE BATCH
// =============================================================================

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        collection: Collection,
        id: u64,
        row: Vec<u8>,
    },
    Delete {
        collection: Collection,
        id: u64,
    },
    Link(EndorserLink),
    Unlink(EndorserLink),
    /// Advance the id counter of a collection.
    SetNextId {
        collection: Collection,
        next: u64,
    },
}

/// An ordered set of writes applied atomically by [`RegistryStore::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: Collection, id: u64, row: Vec<u8>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            collection,
            id,
            row,
        });
        self
    }

    pub fn delete(&mut self, collection: Collection, id: u64) -> &mut Self {
        self.ops.push(WriteOp::Delete { collection, id });
        self
    }

    pub fn link(&mut self, link: EndorserLink) -> &mut Self {
        self.ops.push(WriteOp::Link(link));
        self
    }

    pub fn unlink(&mut self, link: EndorserLink) -> &mut Self {
        self.ops.push(WriteOp::Unlink(link));
        self
    }

    pub fn set_next_id(&mut self, collection: Collection, next: u64) -> &mut Self {
        self.ops.push(WriteOp::SetNextId { collection, next });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// =============================================================================
// REGISTRYSTORE TRAIT
// =============================================================================

/// Raw storage operations shared by every backend.
///
/// Reads never mutate. Writes go through `commit` only.
pub trait RegistryStore {
    /// Fetch the encoded row with `id`.
    fn get(&self, collection: Collection, id: u64) -> Result<Option<Vec<u8>>, LudError>;

    /// All rows of a collection in ascending id order.
    fn scan(&self, collection: Collection) -> Result<Vec<(u64, Vec<u8>)>, LudError>;

    /// Number of rows in a collection.
    fn count(&self, collection: Collection) -> Result<usize, LudError>;

    /// All endorser-mentor links in `(endorser, mentor)` order.
    fn links(&self) -> Result<Vec<EndorserLink>, LudError>;

    /// The id the next inserted row of `collection` will receive. Starts at 1.
    fn next_id(&self, collection: Collection) -> Result<u64, LudError>;

    /// Apply every op of `batch` atomically.
    fn commit(&mut self, batch: WriteBatch) -> Result<(), LudError>;
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// Volatile backend. Used for tests and throwaway servers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: BTreeMap<Collection, BTreeMap<u64, Vec<u8>>>,
    links: BTreeSet<(UserId, UserId)>,
    next_ids: BTreeMap<Collection, u64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for MemoryStore {
    fn get(&self, collection: Collection, id: u64) -> Result<Option<Vec<u8>>, LudError> {
        Ok(self
            .rows
            .get(&collection)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    fn scan(&self, collection: Collection) -> Result<Vec<(u64, Vec<u8>)>, LudError> {
        Ok(self
            .rows
            .get(&collection)
            .map(|rows| rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default())
    }

    fn count(&self, collection: Collection) -> Result<usize, LudError> {
        Ok(self.rows.get(&collection).map_or(0, BTreeMap::len))
    }

    fn links(&self) -> Result<Vec<EndorserLink>, LudError> {
        Ok(self
            .links
            .iter()
            .map(|(endorser, mentor)| EndorserLink::new(*endorser, *mentor))
            .collect())
    }

    fn next_id(&self, collection: Collection) -> Result<u64, LudError> {
        Ok(self.next_ids.get(&collection).copied().unwrap_or(1))
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), LudError> {
        // In-memory writes cannot fail part-way, so applying in order is atomic.
        for op in batch.into_ops() {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    row,
                } => {
                    self.rows.entry(collection).or_default().insert(id, row);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(rows) = self.rows.get_mut(&collection) {
                        rows.remove(&id);
                    }
                }
                WriteOp::Link(link) => {
                    self.links.insert((link.endorser, link.mentor));
                }
                WriteOp::Unlink(link) => {
                    self.links.remove(&(link.endorser, link.mentor));
                }
                WriteOp::SetNextId { collection, next } => {
                    self.next_ids.insert(collection, next);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_starts_at_one() {
        let store = MemoryStore::new();
        for collection in Collection::ALL {
            assert_eq!(store.next_id(collection).expect("next id"), 1);
        }
    }

    #[test]
    fn commit_applies_ops_in_order() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Users, 1, vec![1])
            .put(Collection::Users, 1, vec![2])
            .set_next_id(Collection::Users, 2);
        assert_eq!(batch.len(), 3);
        store.commit(batch).expect("commit");

        assert_eq!(store.get(Collection::Users, 1).expect("get"), Some(vec![2]));
        assert_eq!(store.next_id(Collection::Users).expect("next id"), 2);
        assert_eq!(store.count(Collection::Users).expect("count"), 1);
    }

    #[test]
    fn delete_and_scan() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Mentees, 3, vec![3])
            .put(Collection::Mentees, 1, vec![1])
            .put(Collection::Mentees, 2, vec![2]);
        store.commit(batch).expect("commit");

        let mut batch = WriteBatch::new();
        batch.delete(Collection::Mentees, 2);
        store.commit(batch).expect("commit");

        let ids: Vec<u64> = store
            .scan(Collection::Mentees)
            .expect("scan")
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(store.scan(Collection::Users).expect("scan").is_empty());
    }

    #[test]
    fn links_are_a_set() {
        let mut store = MemoryStore::new();
        let link = EndorserLink::new(UserId(1), UserId(2));
        let mut batch = WriteBatch::new();
        batch.link(link).link(link);
        store.commit(batch).expect("commit");
        assert_eq!(store.links().expect("links"), vec![link]);

        let mut batch = WriteBatch::new();
        batch.unlink(link);
        store.commit(batch).expect("commit");
        assert!(store.links().expect("links").is_empty());
    }
}
