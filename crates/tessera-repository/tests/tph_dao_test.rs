//! DAO behaviour for a table-per-hierarchy entity on the in-memory backend.

mod common;

use common::*;
use tessera_core::{ErrorKind, Key, Predicate, Record, TesseraError};
use tessera_repository::{Dao, GenericDao, LoadAll, MemoryBackend};

type TphDao = Dao<TphEntity, TphDto, MemoryBackend<TphEntity>>;

async fn setup() -> (MemoryBackend<TphEntity>, TphDao) {
    let backend = memory_tph();
    let dao = Dao::builder(backend.clone()).build().await.unwrap();
    (backend, dao)
}

fn seeded() -> [TphEntity; 3] {
    [
        TphEntity::Base(TphBaseEntity {
            key: 7,
            value: Some("test".to_string()),
        }),
        TphEntity::Tph1(Tph1Entity {
            key: 8,
            value: Some("test".to_string()),
            specific_property_tph1: 1,
        }),
        TphEntity::Tph2(Tph2Entity {
            key: 9,
            value: Some("test".to_string()),
            specific_property_tph2: 2,
        }),
    ]
}

#[tokio::test]
async fn test_shapes_are_paired_by_name() {
    let (_backend, dao) = setup().await;
    assert!(dao.shapes().is_polymorphic());
    assert_eq!(dao.shapes().dto_shape("Tph1Entity").unwrap(), "Tph1Dto");
    assert_eq!(dao.shapes().entity_shape("TphBaseDto").unwrap(), "TphBaseEntity");
}

#[tokio::test]
async fn test_can_insert_each_subtype() {
    let (backend, dao) = setup().await;

    let base = dao.insert_or_update(&tph_base(7, "test")).await.unwrap();
    let first = dao.insert_or_update(&tph1(8, "test", 1)).await.unwrap();
    let second = dao.insert_or_update(&tph2(9, "test", 2)).await.unwrap();

    assert_eq!(base, tph_base(7, "test"));
    assert_eq!(first, tph1(8, "test", 1));
    assert_eq!(second, tph2(9, "test", 2));

    let shapes: Vec<_> = backend.snapshot().await.iter().map(Record::shape).collect();
    assert_eq!(shapes, vec!["TphBaseEntity", "Tph1Entity", "Tph2Entity"]);
}

#[tokio::test]
async fn test_can_replace_keeping_subtype() {
    let (backend, dao) = setup().await;
    backend.seed(seeded()).await;

    let replaced = dao.insert_or_update(&tph1(8, "test2", 5)).await.unwrap();

    assert_eq!(replaced, tph1(8, "test2", 5));
    let stored = backend.snapshot().await;
    assert_eq!(stored.len(), 3);
    assert_eq!(
        stored[1],
        TphEntity::Tph1(Tph1Entity {
            key: 8,
            value: Some("test2".to_string()),
            specific_property_tph1: 5,
        })
    );
}

#[tokio::test]
async fn test_can_insert_and_replace_multiple_dtos() {
    let (backend, dao) = setup().await;
    backend.seed(seeded()).await;

    let summary = dao
        .insert_or_update_all(&[tph_base(7, "test1"), tph1(8, "test2", 1), tph2(10, "test3", 3)])
        .await
        .unwrap();

    assert_eq!(summary.updated, 2);
    assert_eq!(summary.inserted, 1);
    assert_eq!(
        dao.load_all().await.unwrap(),
        vec![
            tph_base(7, "test1"),
            tph1(8, "test2", 1),
            tph2(9, "test", 2),
            tph2(10, "test3", 3),
        ]
    );
}

#[tokio::test]
async fn test_round_trip_keeps_concrete_subtype() {
    let (_backend, dao) = setup().await;

    dao.insert_or_update(&tph1(8, "test", 1)).await.unwrap();
    let loaded = dao.first_or_default(Predicate::eq("key", 8)).await.unwrap();

    assert_eq!(loaded, Some(tph1(8, "test", 1)));
}

#[tokio::test]
async fn test_can_delete_each_subtype() {
    let (backend, dao) = setup().await;
    backend.seed(seeded()).await;

    assert_eq!(dao.delete(Key::from(7)).await.unwrap(), Some(tph_base(7, "test")));
    assert_eq!(dao.delete(Key::from(8)).await.unwrap(), Some(tph1(8, "test", 1)));
    assert_eq!(dao.delete(Key::from(9)).await.unwrap(), Some(tph2(9, "test", 2)));
    assert!(backend.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_delete_works_with_list_of_keys() {
    let (backend, dao) = setup().await;
    backend.seed(seeded()).await;

    let deleted = dao
        .delete_all(&[Key::from(8), Key::from(9), Key::from(11)])
        .await
        .unwrap();

    assert_eq!(deleted, vec![tph1(8, "test", 1), tph2(9, "test", 2)]);
    assert_eq!(backend.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_where_clause_on_shared_fields() {
    let (backend, dao) = setup().await;
    backend.seed(seeded()).await;

    let found = dao.filter(Predicate::ge("key", 8)).await.unwrap();
    assert_eq!(found, vec![tph1(8, "test", 1), tph2(9, "test", 2)]);
}

#[tokio::test]
async fn test_subtype_only_field_is_rejected_in_predicates() {
    let (_backend, dao) = setup().await;

    let err = dao
        .filter(Predicate::eq("specific_property_tph1", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, TesseraError::UnknownField { .. }));
}

// A DTO hierarchy missing the counterpart of Tph2Entity.
#[derive(Debug, Clone, PartialEq)]
enum PartialTphDto {
    Base(TphBaseDto),
    Tph1(Tph1Dto),
}

tessera_core::hierarchy!(PartialTphDto, discriminator = "discriminator" {
    Base(TphBaseDto),
    Tph1(Tph1Dto),
});

#[tokio::test]
async fn test_unpaired_entity_shape_fails_construction() {
    let err = Dao::<TphEntity, PartialTphDto, _>::builder(memory_tph())
        .build()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(err, TesseraError::UnmatchedShape { ref shape, .. } if shape == "Tph2Entity"));
}
