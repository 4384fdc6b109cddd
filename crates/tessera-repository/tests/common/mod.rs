//! Common test infrastructure for DAO integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tessera_config::DatabaseConfig;
use tessera_repository::{DatabasePool, DatabasePoolInterface, MemoryBackend, SqliteBackend};
use uuid::Uuid;

// ============ Simple shapes ============

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleEntity {
    pub key: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleDto {
    pub key: i32,
    pub value: Option<String>,
}

tessera_core::record!(SimpleEntity { key, value });
tessera_core::record!(SimpleDto key(key) { key, value });

pub fn simple(key: i32, value: &str) -> SimpleDto {
    SimpleDto {
        key,
        value: Some(value.to_string()),
    }
}

pub fn simple_entity(key: i32, value: &str) -> SimpleEntity {
    SimpleEntity {
        key,
        value: Some(value.to_string()),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleWithFkEntity {
    pub key: i32,
    pub value: Option<String>,
    pub fk: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleWithFkDto {
    pub key: i32,
    pub value: Option<String>,
    pub fk: i32,
}

tessera_core::record!(SimpleWithFkEntity { key, value, fk });
tessera_core::record!(SimpleWithFkDto { key, value, fk });

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditEntity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub score: Option<f64>,
}

tessera_core::record!(AuditEntity { id, created_at, active, score });
tessera_core::record!(AuditDto { id, created_at, active, score });

// ============ Composite-key shapes ============

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeEntity {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeDto {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
}

tessera_core::record!(CompositeEntity { key1, key2, value });
tessera_core::record!(CompositeDto key(key1, key2) { key1, key2, value });

pub fn composite(key1: i32, key2: i32, value: &str) -> CompositeDto {
    CompositeDto {
        key1,
        key2,
        value: Some(value.to_string()),
    }
}

pub fn composite_entity(key1: i32, key2: i32, value: &str) -> CompositeEntity {
    CompositeEntity {
        key1,
        key2,
        value: Some(value.to_string()),
    }
}

// ============ Table-per-hierarchy shapes ============

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TphBaseEntity {
    pub key: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tph1Entity {
    pub key: i32,
    pub value: Option<String>,
    pub specific_property_tph1: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tph2Entity {
    pub key: i32,
    pub value: Option<String>,
    pub specific_property_tph2: i32,
}

tessera_core::record!(TphBaseEntity { key, value });
tessera_core::record!(Tph1Entity { key, value, specific_property_tph1 });
tessera_core::record!(Tph2Entity { key, value, specific_property_tph2 });

#[derive(Debug, Clone, PartialEq)]
pub enum TphEntity {
    Base(TphBaseEntity),
    Tph1(Tph1Entity),
    Tph2(Tph2Entity),
}

tessera_core::hierarchy!(TphEntity, discriminator = "discriminator" {
    Base(TphBaseEntity),
    Tph1(Tph1Entity),
    Tph2(Tph2Entity),
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TphBaseDto {
    pub key: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tph1Dto {
    pub key: i32,
    pub value: Option<String>,
    pub specific_property_tph1: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tph2Dto {
    pub key: i32,
    pub value: Option<String>,
    pub specific_property_tph2: i32,
}

tessera_core::record!(TphBaseDto key(key) { key, value });
tessera_core::record!(Tph1Dto key(key) { key, value, specific_property_tph1 });
tessera_core::record!(Tph2Dto key(key) { key, value, specific_property_tph2 });

#[derive(Debug, Clone, PartialEq)]
pub enum TphDto {
    Base(TphBaseDto),
    Tph1(Tph1Dto),
    Tph2(Tph2Dto),
}

tessera_core::hierarchy!(TphDto, discriminator = "discriminator" {
    Base(TphBaseDto),
    Tph1(Tph1Dto),
    Tph2(Tph2Dto),
});

pub fn tph_base(key: i32, value: &str) -> TphDto {
    TphDto::Base(TphBaseDto {
        key,
        value: Some(value.to_string()),
    })
}

pub fn tph1(key: i32, value: &str, specific: i32) -> TphDto {
    TphDto::Tph1(Tph1Dto {
        key,
        value: Some(value.to_string()),
        specific_property_tph1: specific,
    })
}

pub fn tph2(key: i32, value: &str, specific: i32) -> TphDto {
    TphDto::Tph2(Tph2Dto {
        key,
        value: Some(value.to_string()),
        specific_property_tph2: specific,
    })
}

// ============ Composite-key hierarchy shapes ============

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTphBaseEntity {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTph1Entity {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
    pub specific_property_composite_tph1: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTph2Entity {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
    pub specific_property_composite_tph2: i32,
}

tessera_core::record!(CompositeTphBaseEntity { key1, key2, value });
tessera_core::record!(CompositeTph1Entity { key1, key2, value, specific_property_composite_tph1 });
tessera_core::record!(CompositeTph2Entity { key1, key2, value, specific_property_composite_tph2 });

#[derive(Debug, Clone, PartialEq)]
pub enum CompositeTphEntity {
    Base(CompositeTphBaseEntity),
    Tph1(CompositeTph1Entity),
    Tph2(CompositeTph2Entity),
}

tessera_core::hierarchy!(CompositeTphEntity, discriminator = "discriminator" {
    Base(CompositeTphBaseEntity),
    Tph1(CompositeTph1Entity),
    Tph2(CompositeTph2Entity),
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTphBaseDto {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTph1Dto {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
    pub specific_property_composite_tph1: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeTph2Dto {
    pub key1: i32,
    pub key2: i32,
    pub value: Option<String>,
    pub specific_property_composite_tph2: i32,
}

tessera_core::record!(CompositeTphBaseDto { key1, key2, value });
tessera_core::record!(CompositeTph1Dto { key1, key2, value, specific_property_composite_tph1 });
tessera_core::record!(CompositeTph2Dto { key1, key2, value, specific_property_composite_tph2 });

#[derive(Debug, Clone, PartialEq)]
pub enum CompositeTphDto {
    Base(CompositeTphBaseDto),
    Tph1(CompositeTph1Dto),
    Tph2(CompositeTph2Dto),
}

tessera_core::hierarchy!(CompositeTphDto, discriminator = "discriminator" {
    Base(CompositeTphBaseDto),
    Tph1(CompositeTph1Dto),
    Tph2(CompositeTph2Dto),
});

pub fn composite_tph_base(key1: i32, key2: i32, value: &str) -> CompositeTphDto {
    CompositeTphDto::Base(CompositeTphBaseDto {
        key1,
        key2,
        value: Some(value.to_string()),
    })
}

pub fn composite_tph1(key1: i32, key2: i32, value: &str, specific: i32) -> CompositeTphDto {
    CompositeTphDto::Tph1(CompositeTph1Dto {
        key1,
        key2,
        value: Some(value.to_string()),
        specific_property_composite_tph1: specific,
    })
}

pub fn composite_tph2(key1: i32, key2: i32, value: &str, specific: i32) -> CompositeTphDto {
    CompositeTphDto::Tph2(CompositeTph2Dto {
        key1,
        key2,
        value: Some(value.to_string()),
        specific_property_composite_tph2: specific,
    })
}

// ============ Backends ============

pub fn memory_simple() -> MemoryBackend<SimpleEntity> {
    MemoryBackend::new(&["key"])
}

pub fn memory_composite() -> MemoryBackend<CompositeEntity> {
    MemoryBackend::new(&["key1", "key2"])
}

pub fn memory_tph() -> MemoryBackend<TphEntity> {
    MemoryBackend::new(&["key"])
}

pub fn memory_composite_tph() -> MemoryBackend<CompositeTphEntity> {
    MemoryBackend::new(&["key1", "key2"])
}

/// Tables mirroring the record shapes above. Table names are the base
/// entity shape names.
pub const SCHEMA: &str = r#"
CREATE TABLE "SimpleEntity" (
    "key" INTEGER PRIMARY KEY,
    "value" TEXT
);
CREATE TABLE "SimpleWithFkEntity" (
    "key" INTEGER PRIMARY KEY,
    "value" TEXT,
    "fk" INTEGER NOT NULL REFERENCES "SimpleEntity" ("key")
);
CREATE TABLE "AuditEntity" (
    "id" TEXT PRIMARY KEY,
    "created_at" TEXT NOT NULL,
    "active" BOOLEAN NOT NULL,
    "score" REAL
);
CREATE TABLE "CompositeEntity" (
    "key1" INTEGER NOT NULL,
    "key2" INTEGER NOT NULL,
    "value" TEXT,
    PRIMARY KEY ("key1", "key2")
);
CREATE TABLE "TphBaseEntity" (
    "key" INTEGER PRIMARY KEY,
    "value" TEXT,
    "discriminator" TEXT NOT NULL,
    "specific_property_tph1" INTEGER,
    "specific_property_tph2" INTEGER
);
"#;

/// Opens a private in-memory SQLite database with [`SCHEMA`] applied.
pub async fn sqlite_pool() -> Arc<DatabasePool> {
    let pool = DatabasePool::new(&DatabaseConfig::default())
        .await
        .expect("Failed to open in-memory SQLite database");
    pool.execute_script(SCHEMA)
        .await
        .expect("Failed to create test schema");
    Arc::new(pool)
}

pub fn sqlite_backend<E: tessera_core::Record>(pool: &Arc<DatabasePool>) -> SqliteBackend<E> {
    SqliteBackend::new(Arc::clone(pool) as Arc<dyn DatabasePoolInterface>)
}
