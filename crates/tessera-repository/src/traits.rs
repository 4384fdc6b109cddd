//! DAO trait definitions.

use async_trait::async_trait;
use serde::Serialize;
use tessera_core::{Interface, Key, Predicate, Record, TesseraResult};

/// Read-only access to every stored record as DTOs.
#[async_trait]
pub trait LoadAll<D: Record>: Send + Sync {
    /// Loads every stored record in natural table order.
    async fn load_all(&self) -> TesseraResult<Vec<D>>;
}

/// Generic data access object over DTO shape `D`.
///
/// "Not found" is `Ok(None)` or an empty list. Any storage failure is an
/// `Err`, already logged by the implementation.
#[async_trait]
pub trait GenericDao<D: Record>: LoadAll<D> + Interface {
    /// Inserts the DTO, or overwrites the stored record with the same key.
    /// Returns the record as stored (with a generated key filled in).
    async fn insert_or_update(&self, dto: &D) -> TesseraResult<D>;

    /// Upserts a batch with one lookup query and one commit.
    async fn insert_or_update_all(&self, dtos: &[D]) -> TesseraResult<UpsertSummary>;

    /// Deletes the record with the given key and returns it.
    async fn delete(&self, key: Key) -> TesseraResult<Option<D>>;

    /// Deletes every record whose key is listed. Missing keys are skipped.
    async fn delete_all(&self, keys: &[Key]) -> TesseraResult<Vec<D>>;

    /// Returns the first record, in natural order, matching the predicate.
    async fn first_or_default(&self, predicate: Predicate<D>) -> TesseraResult<Option<D>>;

    /// Returns every record matching the predicate, in natural order.
    async fn filter(&self, predicate: Predicate<D>) -> TesseraResult<Vec<D>>;
}

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    /// Rows written.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated
    }
}
