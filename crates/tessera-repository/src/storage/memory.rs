//! In-process storage backend.

use super::{Session, StorageBackend, TableSchema};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tessera_core::{Key, Predicate, Record, TesseraError, TesseraResult, Value};
use tokio::sync::RwLock;
use tracing::debug;

struct MemoryTable<E> {
    rows: RwLock<Vec<E>>,
    sequence: AtomicI64,
}

/// A table held in memory. Rows keep insertion order.
///
/// Cloning the backend shares the table.
pub struct MemoryBackend<E> {
    table: Arc<MemoryTable<E>>,
    schema: Arc<TableSchema>,
}

impl<E: Record> MemoryBackend<E> {
    /// Creates an empty table with the given primary-key columns.
    #[must_use]
    pub fn new(primary_key: &[&str]) -> Self {
        let schema = TableSchema {
            table: E::shapes().first().copied().unwrap_or("records").to_string(),
            primary_key: primary_key.iter().map(ToString::to_string).collect(),
            generated_key: false,
            discriminator: E::discriminator(),
        };
        Self {
            table: Arc::new(MemoryTable {
                rows: RwLock::new(Vec::new()),
                sequence: AtomicI64::new(0),
            }),
            schema: Arc::new(schema),
        }
    }

    /// Lets the table assign single-column integer keys left unset.
    #[must_use]
    pub fn with_generated_key(mut self) -> Self {
        let mut schema = (*self.schema).clone();
        schema.generated_key = schema.primary_key.len() == 1;
        self.schema = Arc::new(schema);
        self
    }

    /// Inserts rows directly, bypassing sessions.
    pub async fn seed(&self, entities: impl IntoIterator<Item = E>) {
        self.table.rows.write().await.extend(entities);
    }

    /// Returns a copy of every committed row.
    pub async fn snapshot(&self) -> Vec<E> {
        self.table.rows.read().await.clone()
    }
}

impl<E> Clone for MemoryBackend<E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            schema: Arc::clone(&self.schema),
        }
    }
}

#[async_trait]
impl<E: Record> StorageBackend<E> for MemoryBackend<E> {
    type Session = MemorySession<E>;

    async fn schema(&self) -> TesseraResult<TableSchema> {
        Ok((*self.schema).clone())
    }

    async fn open(&self) -> TesseraResult<Self::Session> {
        Ok(MemorySession {
            table: Arc::clone(&self.table),
            schema: Arc::clone(&self.schema),
            staged: Vec::new(),
        })
    }
}

enum Staged<E> {
    Insert(E),
    Update(E),
    Remove(Key),
}

/// Unit of work on a [`MemoryBackend`].
pub struct MemorySession<E> {
    table: Arc<MemoryTable<E>>,
    schema: Arc<TableSchema>,
    staged: Vec<Staged<E>>,
}

impl<E: Record> MemorySession<E> {
    fn position(&self, rows: &[E], key: &Key) -> TesseraResult<Option<usize>> {
        for (i, row) in rows.iter().enumerate() {
            if self.schema.key_of(row)? == *key {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    async fn next_key(&self) -> TesseraResult<i64> {
        let rows = self.table.rows.read().await;
        let column = &self.schema.primary_key[0];
        let staged = self.staged.iter().filter_map(|op| match op {
            Staged::Insert(e) | Staged::Update(e) => Some(e),
            Staged::Remove(_) => None,
        });
        let highest = rows
            .iter()
            .chain(staged)
            .filter_map(|e| match e.get(column) {
                Some(Value::Int(i)) => Some(i),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        self.table.sequence.fetch_max(highest, Ordering::SeqCst);
        Ok(self.table.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn apply(&self, rows: &mut Vec<E>, op: Staged<E>) -> TesseraResult<()> {
        match op {
            Staged::Insert(entity) => {
                let key = self.schema.key_of(&entity)?;
                if self.position(rows, &key)?.is_some() {
                    return Err(TesseraError::conflict(format!(
                        "duplicate primary key {key} in {}",
                        self.schema.table
                    )));
                }
                rows.push(entity);
            }
            Staged::Update(entity) => {
                let key = self.schema.key_of(&entity)?;
                let index = self.position(rows, &key)?.ok_or_else(|| {
                    TesseraError::conflict(format!("row {key} no longer exists in {}", self.schema.table))
                })?;
                rows[index] = entity;
            }
            Staged::Remove(key) => {
                let index = self.position(rows, &key)?.ok_or_else(|| {
                    TesseraError::conflict(format!("row {key} no longer exists in {}", self.schema.table))
                })?;
                rows.remove(index);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Record> Session<E> for MemorySession<E> {
    async fn find(&mut self, key: &Key) -> TesseraResult<Option<E>> {
        let rows = self.table.rows.read().await;
        Ok(self.position(&rows, key)?.map(|i| rows[i].clone()))
    }

    async fn fetch(
        &mut self,
        filter: Option<&Predicate<E>>,
        limit: Option<usize>,
    ) -> TesseraResult<Vec<E>> {
        let rows = self.table.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| filter.map_or(true, |p| p.matches(row)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn add(&mut self, mut entity: E) -> TesseraResult<E> {
        if self.schema.needs_generated_key(&entity) {
            let next = self.next_key().await?;
            entity.set(&self.schema.primary_key[0], Value::Int(next))?;
        }
        self.staged.push(Staged::Insert(entity.clone()));
        Ok(entity)
    }

    async fn update(&mut self, entity: E) -> TesseraResult<()> {
        self.staged.push(Staged::Update(entity));
        Ok(())
    }

    async fn remove(&mut self, entity: &E) -> TesseraResult<()> {
        let key = self.schema.key_of(entity)?;
        self.staged.push(Staged::Remove(key));
        Ok(())
    }

    async fn commit(&mut self) -> TesseraResult<()> {
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();
        let mut guard = self.table.rows.write().await;
        let mut rows = guard.clone();
        for op in staged {
            self.apply(&mut rows, op)?;
        }
        *guard = rows;
        debug!(table = %self.schema.table, changes = count, "Committed memory session");
        Ok(())
    }
}
