//! Storage backend contract.
//!
//! A [`StorageBackend`] describes one table of entities and opens
//! [`Session`]s on it. A session is a unit of work: reads go straight to
//! the store, writes are staged and become visible together at
//! [`Session::commit`]. Dropping a session without committing discards its
//! staged writes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;
use tessera_core::{Key, Predicate, Record, TesseraError, TesseraResult};

/// Table metadata reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub table: String,
    /// Primary-key columns in declared order.
    pub primary_key: Vec<String>,
    /// True when the backend assigns the (single-column) primary key.
    pub generated_key: bool,
    /// Column storing the concrete shape name, for hierarchies.
    pub discriminator: Option<&'static str>,
}

impl TableSchema {
    /// Reads the primary key of an entity in declared column order.
    pub fn key_of<E: Record>(&self, entity: &E) -> TesseraResult<Key> {
        self.primary_key
            .iter()
            .map(|column| {
                entity.get(column).ok_or_else(|| {
                    TesseraError::mapping(format!(
                        "{} has no field for primary key column {column}",
                        entity.shape()
                    ))
                })
            })
            .collect::<TesseraResult<Vec<_>>>()
            .map(Key::composite)
    }

    /// Returns true if the primary key is a single backend-assigned column
    /// and the entity leaves it unset.
    pub fn needs_generated_key<E: Record>(&self, entity: &E) -> bool {
        match (self.generated_key, self.primary_key.as_slice()) {
            (true, [column]) => entity.get(column).map_or(true, |v| v.is_unset()),
            _ => false,
        }
    }
}

/// A table of entities of record type `E`.
#[async_trait]
pub trait StorageBackend<E: Record>: Send + Sync + 'static {
    /// Unit of work type.
    type Session: Session<E>;

    /// Returns the table metadata.
    async fn schema(&self) -> TesseraResult<TableSchema>;

    /// Opens a unit of work.
    async fn open(&self) -> TesseraResult<Self::Session>;
}

/// A unit of work over one table.
#[async_trait]
pub trait Session<E: Record>: Send {
    /// Fetches the entity whose primary key, in declared column order,
    /// equals `key`.
    async fn find(&mut self, key: &Key) -> TesseraResult<Option<E>>;

    /// Largest number of keys, each `width` columns wide, that one key-set
    /// query may carry. Batches beyond it are split across queries.
    fn keys_per_query(&self, _width: usize) -> usize {
        usize::MAX
    }

    /// Fetches entities matching `filter` (all when `None`) in natural
    /// table order, at most `limit` of them.
    async fn fetch(
        &mut self,
        filter: Option<&Predicate<E>>,
        limit: Option<usize>,
    ) -> TesseraResult<Vec<E>>;

    /// Stages an insert. Returns the entity as stored, with a generated key
    /// filled in when the backend assigns one.
    async fn add(&mut self, entity: E) -> TesseraResult<E>;

    /// Stages several inserts.
    async fn add_all(&mut self, entities: Vec<E>) -> TesseraResult<Vec<E>> {
        let mut stored = Vec::with_capacity(entities.len());
        for entity in entities {
            stored.push(self.add(entity).await?);
        }
        Ok(stored)
    }

    /// Stages an update of the row with the entity's primary key.
    async fn update(&mut self, entity: E) -> TesseraResult<()>;

    /// Stages removal of the row with the entity's primary key.
    async fn remove(&mut self, entity: &E) -> TesseraResult<()>;

    /// Stages several removals.
    async fn remove_all(&mut self, entities: &[E]) -> TesseraResult<()> {
        for entity in entities {
            self.remove(entity).await?;
        }
        Ok(())
    }

    /// Applies every staged change atomically.
    async fn commit(&mut self) -> TesseraResult<()>;
}
