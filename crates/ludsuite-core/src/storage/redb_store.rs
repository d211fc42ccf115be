//! # redb-backed Registry Storage
//!
//! A disk-backed registry store using the redb embedded database:
//! - ACID transactions (one per `commit`)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Every collection lives in its own `u64 -> bytes` table. Rows are opaque
//! here; the directory encodes them with postcard.

use super::{Collection, RegistryStore, WriteBatch, WriteOp};
use crate::{EndorserLink, LudError, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
const MENTEES: TableDefinition<u64, &[u8]> = TableDefinition::new("mentees");
const ASSIGNMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assignments");
const ACTIVITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("activities");
const OBJECTIVES: TableDefinition<u64, &[u8]> = TableDefinition::new("objectives");
const YEAR_PLAN: TableDefinition<u64, &[u8]> = TableDefinition::new("year_plan");
const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");
const NOTIFICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("notifications");
const WORK_SCHEDULE: TableDefinition<u64, &[u8]> = TableDefinition::new("work_schedule");

/// Join table: (endorser_id, mentor_id) -> ()
const ENDORSER_LINKS: TableDefinition<(u64, u64), ()> = TableDefinition::new("endorser_links");

/// Table for id counters: "next_id.<collection>" -> u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn table(collection: Collection) -> TableDefinition<'static, u64, &'static [u8]> {
    match collection {
        Collection::Users => USERS,
        Collection::Mentees => MENTEES,
        Collection::Assignments => ASSIGNMENTS,
        Collection::Activities => ACTIVITIES,
        Collection::Objectives => OBJECTIVES,
        Collection::YearPlan => YEAR_PLAN,
        Collection::Assessments => ASSESSMENTS,
        Collection::Notifications => NOTIFICATIONS,
        Collection::WorkSchedule => WORK_SCHEDULE,
    }
}

fn counter_key(collection: Collection) -> String {
    format!("next_id.{}", collection.name())
}

/// A disk-backed registry store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a registry database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LudError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| LudError::IoError(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| LudError::IoError(e.to_string()))?;
            for collection in Collection::ALL {
                let _ = write_txn
                    .open_table(table(collection))
                    .map_err(|e| LudError::IoError(e.to_string()))?;
            }
            let _ = write_txn
                .open_table(ENDORSER_LINKS)
                .map_err(|e| LudError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| LudError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| LudError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), LudError> {
        self.db
            .compact()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        Ok(())
    }
}

impl RegistryStore for RedbStore {
    fn get(&self, collection: Collection, id: u64) -> Result<Option<Vec<u8>>, LudError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(table(collection))
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let row = rows
            .get(id)
            .map_err(|e| LudError::IoError(e.to_string()))?
            .map(|data| data.value().to_vec());
        Ok(row)
    }

    fn scan(&self, collection: Collection) -> Result<Vec<(u64, Vec<u8>)>, LudError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(table(collection))
            .map_err(|e| LudError::IoError(e.to_string()))?;

        let mut out = Vec::new();
        for entry in rows
            .iter()
            .map_err(|e| LudError::IoError(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| LudError::IoError(e.to_string()))?;
            out.push((key.value(), value.value().to_vec()));
        }
        Ok(out)
    }

    fn count(&self, collection: Collection) -> Result<usize, LudError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let rows = read_txn
            .open_table(table(collection))
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let len = rows.len().map_err(|e| LudError::IoError(e.to_string()))?;
        Ok(len as usize)
    }

    fn links(&self) -> Result<Vec<EndorserLink>, LudError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let links = read_txn
            .open_table(ENDORSER_LINKS)
            .map_err(|e| LudError::IoError(e.to_string()))?;

        let mut out = Vec::new();
        for entry in links
            .iter()
            .map_err(|e| LudError::IoError(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| LudError::IoError(e.to_string()))?;
            let (endorser, mentor) = key.value();
            out.push(EndorserLink::new(UserId(endorser), UserId(mentor)));
        }
        Ok(out)
    }

    fn next_id(&self, collection: Collection) -> Result<u64, LudError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let meta = read_txn
            .open_table(METADATA)
            .map_err(|e| LudError::IoError(e.to_string()))?;
        let next = meta
            .get(counter_key(collection).as_str())
            .map_err(|e| LudError::IoError(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(1);
        Ok(next)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), LudError> {
        if batch.is_empty() {
            return Ok(());
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| LudError::IoError(e.to_string()))?;

        // Each op opens its table in its own scope: redb forbids two live
        // handles to the same table inside one transaction.
        for op in batch.into_ops() {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    row,
                } => {
                    let mut rows = write_txn
                        .open_table(table(collection))
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                    rows.insert(id, row.as_slice())
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                }
                WriteOp::Delete { collection, id } => {
                    let mut rows = write_txn
                        .open_table(table(collection))
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                    rows.remove(id)
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                }
                WriteOp::Link(link) => {
                    let mut links = write_txn
                        .open_table(ENDORSER_LINKS)
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                    links
                        .insert((link.endorser.0, link.mentor.0), ())
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                }
                WriteOp::Unlink(link) => {
                    let mut links = write_txn
                        .open_table(ENDORSER_LINKS)
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                    links
                        .remove((link.endorser.0, link.mentor.0))
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                }
                WriteOp::SetNextId { collection, next } => {
                    let mut meta = write_txn
                        .open_table(METADATA)
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                    meta.insert(counter_key(collection).as_str(), next)
                        .map_err(|e| LudError::IoError(e.to_string()))?;
                }
            }
        }

        write_txn
            .commit()
            .map_err(|e| LudError::IoError(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Users, 1, vec![10, 20])
            .put(Collection::Users, 2, vec![30])
            .set_next_id(Collection::Users, 3);
        store.commit(batch).expect("commit");

        assert_eq!(store.count(Collection::Users).expect("count"), 2);
        assert_eq!(
            store.get(Collection::Users, 1).expect("get"),
            Some(vec![10, 20])
        );
        assert_eq!(store.get(Collection::Users, 9).expect("get"), None);
        assert_eq!(store.next_id(Collection::Users).expect("next"), 3);
        assert_eq!(store.next_id(Collection::Mentees).expect("next"), 1);
    }

    #[test]
    fn collections_are_isolated() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut batch = WriteBatch::new();
        batch
            .put(Collection::Objectives, 1, vec![1])
            .put(Collection::Assessments, 1, vec![2]);
        store.commit(batch).expect("commit");

        assert_eq!(
            store.get(Collection::Objectives, 1).expect("get"),
            Some(vec![1])
        );
        assert_eq!(
            store.get(Collection::Assessments, 1).expect("get"),
            Some(vec![2])
        );
        assert_eq!(store.count(Collection::YearPlan).expect("count"), 0);
    }

    #[test]
    fn delete_removes_row() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let mut batch = WriteBatch::new();
        batch.put(Collection::Assignments, 7, vec![7]);
        store.commit(batch).expect("commit");

        let mut batch = WriteBatch::new();
        batch.delete(Collection::Assignments, 7);
        store.commit(batch).expect("commit");

        assert!(store.scan(Collection::Assignments).expect("scan").is_empty());
    }

    #[test]
    fn links_roundtrip() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let a = EndorserLink::new(UserId(1), UserId(5));
        let b = EndorserLink::new(UserId(1), UserId(3));
        let mut batch = WriteBatch::new();
        batch.link(a).link(b);
        store.commit(batch).expect("commit");

        // Ordered by (endorser, mentor)
        assert_eq!(store.links().expect("links"), vec![b, a]);

        let mut batch = WriteBatch::new();
        batch.unlink(a);
        store.commit(batch).expect("commit");
        assert_eq!(store.links().expect("links"), vec![b]);
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let mut batch = WriteBatch::new();
            batch
                .put(Collection::Mentees, 1, vec![42])
                .link(EndorserLink::new(UserId(2), UserId(3)))
                .set_next_id(Collection::Mentees, 2);
            store.commit(batch).expect("commit");
        }

        {
            let store = RedbStore::open(&db_path).expect("reopen db");
            assert_eq!(
                store.get(Collection::Mentees, 1).expect("get"),
                Some(vec![42])
            );
            assert_eq!(store.next_id(Collection::Mentees).expect("next"), 2);
            assert_eq!(store.links().expect("links").len(), 1);
        }
    }

    #[test]
    fn recovery_compact_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            for id in 1..=50u64 {
                let mut batch = WriteBatch::new();
                batch.put(Collection::Activities, id, vec![0; 64]);
                store.commit(batch).expect("commit");
            }
            store.compact().expect("compact");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.count(Collection::Activities).expect("count"), 50);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.commit(WriteBatch::new()).expect("commit");
        assert_eq!(store.count(Collection::Users).expect("count"), 0);
    }
}
