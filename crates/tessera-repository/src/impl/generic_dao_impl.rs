//! `Dao`: the generic DAO over a storage backend.
//!
//! ```text
//! caller
//!   ↓ Arc<dyn GenericDao<D>>     (DTO shape D)
//! Dao<E, D, B>                   ← key descriptor, shape pairs, predicate rewrite
//!   ↓ StorageBackend<E>          (entity shape E)
//! MemoryBackend / SqliteBackend
//! ```
//!
//! Every call opens its own session and commits at most once. Nothing is
//! shared between calls except the immutable key descriptor and shape
//! table built by [`DaoBuilder::build`]; concurrent upserts on one key are
//! only as isolated as the backend's transactions.

use crate::matcher::KeyMatcher;
use crate::storage::{Session, StorageBackend, TableSchema};
use crate::traits::{GenericDao, LoadAll, UpsertSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use tessera_config::DaoSettings;
use tessera_core::{
    overwrite, Key, KeyDescriptor, KeyExtractor, KeyPolicy, KeyStrategy, Predicate, Record,
    ShapeResolver, TesseraError, TesseraResult,
};
use tracing::{debug, error, info, warn};

/// Generic DAO storing entity shape `E` in backend `B` and speaking DTO
/// shape `D` to callers.
pub struct Dao<E, D, B> {
    backend: B,
    keys: KeyDescriptor,
    shapes: ShapeResolver,
    schema: TableSchema,
    lookup_by_primary_key: bool,
    records: PhantomData<fn() -> (E, D)>,
}

impl<E, D, B> Dao<E, D, B>
where
    E: Record,
    D: Record,
    B: StorageBackend<E>,
{
    /// Starts configuring a DAO over `backend`.
    #[must_use]
    pub fn builder(backend: B) -> DaoBuilder<E, D, B> {
        DaoBuilder {
            backend,
            key_strategy: KeyStrategy::default(),
            key_policy: None,
            overrides: Vec::new(),
            records: PhantomData,
        }
    }

    /// Key fields and insert policy.
    #[must_use]
    pub fn keys(&self) -> &KeyDescriptor {
        &self.keys
    }

    /// Entity/DTO shape pairs.
    #[must_use]
    pub fn shapes(&self) -> &ShapeResolver {
        &self.shapes
    }

    /// Backend table metadata read at construction.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn matcher(&self) -> KeyMatcher<'_> {
        KeyMatcher::new(&self.keys)
    }

    fn to_dtos(&self, entities: &[E]) -> TesseraResult<Vec<D>> {
        entities.iter().map(|e| self.shapes.to_dto(e)).collect()
    }

    /// Logs a failed call at the DAO boundary and hands the result back.
    fn settle<T>(&self, operation: &'static str, result: TesseraResult<T>) -> TesseraResult<T> {
        if let Err(err) = &result {
            if err.is_usage_error() {
                warn!(operation, code = err.error_code(), error = %err, "Rejected DAO call");
            } else {
                error!(
                    operation,
                    table = %self.schema.table,
                    code = err.error_code(),
                    error = %err,
                    "DAO operation failed"
                );
            }
        }
        result
    }

    async fn find_existing(&self, session: &mut B::Session, key: &Key) -> TesseraResult<Option<E>> {
        if self.lookup_by_primary_key {
            return session.find(key).await;
        }
        let Some(filter) = self.matcher().predicate::<E>(std::slice::from_ref(key))? else {
            return Ok(None);
        };
        Ok(session.fetch(Some(&filter), Some(1)).await?.into_iter().next())
    }

    async fn upsert_one(&self, dto: &D) -> TesseraResult<D> {
        let incoming: E = self.shapes.to_entity(dto)?;
        let key = self.keys.extract(dto)?;

        let mut session = self.backend.open().await?;
        let stored = if self.keys.skips_lookup(&key) {
            session.add(incoming).await?
        } else if let Some(mut existing) = self.find_existing(&mut session, &key).await? {
            overwrite(&mut existing, &incoming)?;
            session.update(existing.clone()).await?;
            existing
        } else {
            session.add(incoming).await?
        };
        session.commit().await?;

        self.shapes.to_dto(&stored)
    }

    async fn upsert_batch(&self, dtos: &[D]) -> TesseraResult<UpsertSummary> {
        if dtos.is_empty() {
            return Ok(UpsertSummary::default());
        }

        // Later rows with the same key replace earlier ones.
        let mut pending: Vec<(Option<Key>, E)> = Vec::with_capacity(dtos.len());
        let mut slots: HashMap<Key, usize> = HashMap::with_capacity(dtos.len());
        for dto in dtos {
            let entity: E = self.shapes.to_entity(dto)?;
            let key = self.keys.extract(dto)?;
            if self.keys.skips_lookup(&key) {
                pending.push((None, entity));
            } else if let Some(&slot) = slots.get(&key) {
                pending[slot].1 = entity;
            } else {
                slots.insert(key.clone(), pending.len());
                pending.push((Some(key), entity));
            }
        }
        let lookup: Vec<Key> = pending.iter().filter_map(|(key, _)| key.clone()).collect();

        let mut session = self.backend.open().await?;
        let mut matched = self.matcher().fetch(&mut session, &lookup).await?;

        let mut summary = UpsertSummary::default();
        let mut inserts = Vec::new();
        for (key, incoming) in pending {
            match key.and_then(|key| matched.remove(&key)) {
                Some(mut existing) => {
                    overwrite(&mut existing, &incoming)?;
                    session.update(existing).await?;
                    summary.updated += 1;
                }
                None => inserts.push(incoming),
            }
        }
        summary.inserted = inserts.len();
        session.add_all(inserts).await?;
        session.commit().await?;

        Ok(summary)
    }

    async fn delete_one(&self, key: Key) -> TesseraResult<Option<D>> {
        self.keys.check(&key)?;

        let mut session = self.backend.open().await?;
        let Some(existing) = self.find_existing(&mut session, &key).await? else {
            return Ok(None);
        };
        let dto = self.shapes.to_dto(&existing)?;
        session.remove(&existing).await?;
        session.commit().await?;

        Ok(Some(dto))
    }

    async fn delete_batch(&self, keys: &[Key]) -> TesseraResult<Vec<D>> {
        for key in keys {
            self.keys.check(key)?;
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self.backend.open().await?;
        let matched = self.matcher().fetch(&mut session, keys).await?;
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        let entities = matched.into_entities();
        let dtos = self.to_dtos(&entities)?;
        session.remove_all(&entities).await?;
        session.commit().await?;

        Ok(dtos)
    }

    async fn query(&self, predicate: Option<Predicate<D>>, limit: Option<usize>) -> TesseraResult<Vec<D>> {
        let filter = predicate.map(Predicate::<D>::rewrite::<E>).transpose()?;
        let mut session = self.backend.open().await?;
        let entities = session.fetch(filter.as_ref(), limit).await?;
        self.to_dtos(&entities)
    }
}

#[async_trait]
impl<E, D, B> LoadAll<D> for Dao<E, D, B>
where
    E: Record,
    D: Record,
    B: StorageBackend<E>,
{
    async fn load_all(&self) -> TesseraResult<Vec<D>> {
        debug!(table = %self.schema.table, "DAO: load_all");
        let result = self.query(None, None).await;
        self.settle("load_all", result)
    }
}

#[async_trait]
impl<E, D, B> GenericDao<D> for Dao<E, D, B>
where
    E: Record,
    D: Record,
    B: StorageBackend<E>,
{
    async fn insert_or_update(&self, dto: &D) -> TesseraResult<D> {
        debug!(table = %self.schema.table, shape = dto.shape(), "DAO: insert_or_update");
        let result = self.upsert_one(dto).await;
        self.settle("insert_or_update", result)
    }

    async fn insert_or_update_all(&self, dtos: &[D]) -> TesseraResult<UpsertSummary> {
        debug!(table = %self.schema.table, count = dtos.len(), "DAO: insert_or_update_all");
        let result = self.upsert_batch(dtos).await;
        self.settle("insert_or_update_all", result)
    }

    async fn delete(&self, key: Key) -> TesseraResult<Option<D>> {
        debug!(table = %self.schema.table, %key, "DAO: delete");
        let result = self.delete_one(key).await;
        self.settle("delete", result)
    }

    async fn delete_all(&self, keys: &[Key]) -> TesseraResult<Vec<D>> {
        debug!(table = %self.schema.table, count = keys.len(), "DAO: delete_all");
        let result = self.delete_batch(keys).await;
        self.settle("delete_all", result)
    }

    async fn first_or_default(&self, predicate: Predicate<D>) -> TesseraResult<Option<D>> {
        debug!(table = %self.schema.table, %predicate, "DAO: first_or_default");
        let result = self
            .query(Some(predicate), Some(1))
            .await
            .map(|dtos| dtos.into_iter().next());
        self.settle("first_or_default", result)
    }

    async fn filter(&self, predicate: Predicate<D>) -> TesseraResult<Vec<D>> {
        debug!(table = %self.schema.table, %predicate, "DAO: filter");
        let result = self.query(Some(predicate), None).await;
        self.settle("filter", result)
    }
}

impl<E, D, B> std::fmt::Debug for Dao<E, D, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("table", &self.schema.table)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Configures and builds a [`Dao`].
///
/// Defaults: [`KeyStrategy::Metadata`], and a key policy of
/// [`KeyPolicy::Generated`] when the backend assigns the primary key,
/// [`KeyPolicy::Assigned`] otherwise.
pub struct DaoBuilder<E, D, B> {
    backend: B,
    key_strategy: KeyStrategy,
    key_policy: Option<KeyPolicy>,
    overrides: Vec<(&'static str, &'static str)>,
    records: PhantomData<fn() -> (E, D)>,
}

impl<E, D, B> DaoBuilder<E, D, B>
where
    E: Record,
    D: Record,
    B: StorageBackend<E>,
{
    #[must_use]
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    #[must_use]
    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = Some(policy);
        self
    }

    /// Pairs an entity shape with a DTO shape whose names do not follow the
    /// `Entity` / `Dto` suffix convention.
    #[must_use]
    pub fn pair(mut self, entity: &'static str, dto: &'static str) -> Self {
        self.overrides.push((entity, dto));
        self
    }

    /// Applies the `[dao]` configuration section.
    #[must_use]
    pub fn settings(mut self, settings: &DaoSettings) -> Self {
        self.key_strategy = settings.key_strategy;
        if let Some(policy) = settings.key_policy {
            self.key_policy = Some(policy);
        }
        self
    }

    /// Reads backend metadata and resolves keys and shape pairs.
    ///
    /// Every configuration problem surfaces here, before any call is made.
    pub async fn build(self) -> TesseraResult<Dao<E, D, B>> {
        self.assemble().await.map_err(|err| {
            error!(
                entity = E::shapes().first().copied().unwrap_or_default(),
                dto = D::shapes().first().copied().unwrap_or_default(),
                code = err.error_code(),
                error = %err,
                "Failed to build DAO"
            );
            err
        })
    }

    async fn assemble(self) -> TesseraResult<Dao<E, D, B>> {
        let schema = self.backend.schema().await?;
        let fields = KeyExtractor::extract::<D>(self.key_strategy, &schema.primary_key)?;
        if let Some(field) = fields.iter().find(|field| !E::has_field(field)) {
            return Err(TesseraError::configuration(format!(
                "key field {field} is not declared by entity table {}",
                schema.table
            )));
        }

        let policy = self.key_policy.unwrap_or(if schema.generated_key {
            KeyPolicy::Generated
        } else {
            KeyPolicy::Assigned
        });
        let keys = KeyDescriptor::new(fields, policy)?;
        let shapes = ShapeResolver::for_records::<E, D>(&self.overrides)?;
        let lookup_by_primary_key = keys
            .fields()
            .iter()
            .copied()
            .eq(schema.primary_key.iter().map(String::as_str));

        info!(
            table = %schema.table,
            keys = ?keys.fields(),
            policy = ?keys.policy(),
            polymorphic = shapes.is_polymorphic(),
            "DAO ready"
        );
        Ok(Dao {
            backend: self.backend,
            keys,
            shapes,
            schema,
            lookup_by_primary_key,
            records: PhantomData,
        })
    }
}
