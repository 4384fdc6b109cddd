//! Batch key matching.
//!
//! Turns a set of keys into key-set predicates so a batch operation issues
//! one query per backend-sized chunk instead of one lookup per key.

use crate::storage::Session;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tessera_core::{Key, KeyDescriptor, Predicate, Record, TesseraResult};

/// Builds key-set predicates for a key descriptor.
#[derive(Debug, Clone, Copy)]
pub struct KeyMatcher<'a> {
    descriptor: &'a KeyDescriptor,
}

impl<'a> KeyMatcher<'a> {
    #[must_use]
    pub const fn new(descriptor: &'a KeyDescriptor) -> Self {
        Self { descriptor }
    }

    /// Returns a predicate matching exactly the records whose key is one of
    /// `keys`, or `None` when `keys` is empty.
    ///
    /// Single-field keys become a membership test. Composite keys become a
    /// disjunction of per-key conjunctions, so `(7, 8)` never matches a row
    /// holding `(7, 7)` and `(8, 8)`.
    pub fn predicate<R: Record>(&self, keys: &[Key]) -> TesseraResult<Option<Predicate<R>>> {
        let keys = self.distinct(keys)?;
        if keys.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.membership(&keys)))
    }

    /// Loads every stored record whose key is in `keys`.
    ///
    /// Issues one query per [`Session::keys_per_query`] keys.
    pub async fn fetch<E, S>(&self, session: &mut S, keys: &[Key]) -> TesseraResult<BatchMatch<E>>
    where
        E: Record,
        S: Session<E>,
    {
        let keys = self.distinct(keys)?;
        let mut matched = BatchMatch::default();
        if keys.is_empty() {
            return Ok(matched);
        }

        let capacity = session.keys_per_query(self.descriptor.fields().len()).max(1);
        for chunk in keys.chunks(capacity) {
            let predicate = self.membership::<E>(chunk);
            for entity in session.fetch(Some(&predicate), None).await? {
                let key = self.descriptor.extract(&entity)?;
                matched.insert(key, entity);
            }
        }
        Ok(matched)
    }

    fn membership<R: Record>(&self, keys: &[Key]) -> Predicate<R> {
        let fields = self.descriptor.fields();
        if let [field] = fields {
            Predicate::is_in(*field, keys.iter().map(|key| key.parts()[0].clone()))
        } else {
            Predicate::any(keys.iter().map(|key| {
                Predicate::all(
                    fields
                        .iter()
                        .zip(key.parts())
                        .map(|(field, value)| Predicate::eq(*field, value.clone())),
                )
            }))
        }
    }

    fn distinct(&self, keys: &[Key]) -> TesseraResult<Vec<Key>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut distinct = Vec::with_capacity(keys.len());
        for key in keys {
            self.descriptor.check(key)?;
            if seen.insert(key) {
                distinct.push(key.clone());
            }
        }
        Ok(distinct)
    }
}

/// Stored records found for a key set, indexed by key.
#[derive(Debug, Clone)]
pub struct BatchMatch<E> {
    matched: HashMap<Key, E>,
    order: Vec<Key>,
}

impl<E> Default for BatchMatch<E> {
    fn default() -> Self {
        Self {
            matched: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<E> BatchMatch<E> {
    fn insert(&mut self, key: Key, entity: E) {
        if let Entry::Vacant(slot) = self.matched.entry(key.clone()) {
            slot.insert(entity);
            self.order.push(key);
        }
    }

    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&E> {
        self.matched.get(key)
    }

    /// Takes the record stored under `key` out of the match.
    pub fn remove(&mut self, key: &Key) -> Option<E> {
        let entity = self.matched.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entity)
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.matched.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matched.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Returns the records in the order the backend produced them.
    #[must_use]
    pub fn into_entities(mut self) -> Vec<E> {
        self.order
            .iter()
            .filter_map(|key| self.matched.remove(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySession;
    use crate::storage::{MemoryBackend, StorageBackend};
    use async_trait::async_trait;
    use tessera_core::{Condition, KeyPolicy, TesseraError, Value};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct CompositeEntity {
        key1: i32,
        key2: i32,
        value: Option<String>,
    }

    tessera_core::record!(CompositeEntity { key1, key2, value });

    fn composite(key1: i32, key2: i32) -> CompositeEntity {
        CompositeEntity {
            key1,
            key2,
            value: Some(format!("{key1}-{key2}")),
        }
    }

    #[test]
    fn test_single_field_keys_become_membership() {
        let descriptor = KeyDescriptor::new(vec!["key1"], KeyPolicy::Assigned).unwrap();
        let predicate = KeyMatcher::new(&descriptor)
            .predicate::<CompositeEntity>(&[Key::from(1), Key::from(2), Key::from(1)])
            .unwrap()
            .unwrap();
        assert_eq!(
            predicate.condition(),
            &Condition::In {
                field: "key1",
                values: vec![Value::Int(1), Value::Int(2)],
            }
        );
    }

    #[test]
    fn test_composite_keys_pair_components() {
        let descriptor = KeyDescriptor::new(vec!["key1", "key2"], KeyPolicy::Assigned).unwrap();
        let predicate = KeyMatcher::new(&descriptor)
            .predicate::<CompositeEntity>(&[Key::from((7, 8))])
            .unwrap()
            .unwrap();

        assert!(predicate.matches(&composite(7, 8)));
        assert!(!predicate.matches(&composite(7, 7)));
        assert!(!predicate.matches(&composite(8, 8)));
    }

    #[test]
    fn test_empty_key_set_has_no_predicate() {
        let descriptor = KeyDescriptor::new(vec!["key1"], KeyPolicy::Assigned).unwrap();
        let predicate = KeyMatcher::new(&descriptor).predicate::<CompositeEntity>(&[]).unwrap();
        assert!(predicate.is_none());
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let descriptor = KeyDescriptor::new(vec!["key1", "key2"], KeyPolicy::Assigned).unwrap();
        let err = KeyMatcher::new(&descriptor)
            .predicate::<CompositeEntity>(&[Key::from((1, 2)), Key::from(3)])
            .unwrap_err();
        assert!(matches!(err, TesseraError::KeyArity { expected: 2, actual: 1 }));
    }

    #[tokio::test]
    async fn test_fetch_indexes_by_key() {
        let backend = MemoryBackend::<CompositeEntity>::new(&["key1", "key2"]);
        backend
            .seed([composite(7, 7), composite(7, 8), composite(8, 8)])
            .await;
        let descriptor = KeyDescriptor::new(vec!["key1", "key2"], KeyPolicy::Assigned).unwrap();

        let mut session = backend.open().await.unwrap();
        let mut matched: BatchMatch<CompositeEntity> = KeyMatcher::new(&descriptor)
            .fetch(&mut session, &[Key::from((7, 8)), Key::from((9, 9)), Key::from((8, 8))])
            .await
            .unwrap();

        assert_eq!(matched.len(), 2);
        assert!(!matched.contains(&Key::from((9, 9))));
        assert_eq!(matched.get(&Key::from((7, 8))), Some(&composite(7, 8)));
        assert_eq!(matched.remove(&Key::from((7, 8))), Some(composite(7, 8)));
        assert_eq!(matched.into_entities(), vec![composite(8, 8)]);
    }

    /// Holds at most two keys per query and counts the queries it runs.
    struct NarrowSession {
        inner: MemorySession<CompositeEntity>,
        queries: usize,
    }

    #[async_trait]
    impl Session<CompositeEntity> for NarrowSession {
        fn keys_per_query(&self, _width: usize) -> usize {
            2
        }

        async fn find(&mut self, key: &Key) -> TesseraResult<Option<CompositeEntity>> {
            self.inner.find(key).await
        }

        async fn fetch(
            &mut self,
            filter: Option<&Predicate<CompositeEntity>>,
            limit: Option<usize>,
        ) -> TesseraResult<Vec<CompositeEntity>> {
            self.queries += 1;
            self.inner.fetch(filter, limit).await
        }

        async fn add(&mut self, entity: CompositeEntity) -> TesseraResult<CompositeEntity> {
            self.inner.add(entity).await
        }

        async fn update(&mut self, entity: CompositeEntity) -> TesseraResult<()> {
            self.inner.update(entity).await
        }

        async fn remove(&mut self, entity: &CompositeEntity) -> TesseraResult<()> {
            self.inner.remove(entity).await
        }

        async fn commit(&mut self) -> TesseraResult<()> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn test_fetch_splits_key_set_by_session_capacity() {
        let backend = MemoryBackend::<CompositeEntity>::new(&["key1", "key2"]);
        backend.seed((0..5).map(|i| composite(i, i))).await;
        let descriptor = KeyDescriptor::new(vec!["key1", "key2"], KeyPolicy::Assigned).unwrap();

        let mut session = NarrowSession {
            inner: backend.open().await.unwrap(),
            queries: 0,
        };
        let keys: Vec<Key> = (0..6_i32)
            .map(|i| Key::from((i, i)))
            .chain([Key::from((0, 0))])
            .collect();
        let matched: BatchMatch<CompositeEntity> = KeyMatcher::new(&descriptor)
            .fetch(&mut session, &keys)
            .await
            .unwrap();

        assert_eq!(session.queries, 3);
        assert_eq!(matched.len(), 5);
        assert_eq!(
            matched.into_entities(),
            (0..5).map(|i| composite(i, i)).collect::<Vec<_>>()
        );
    }
}
