//! # Tessera Repository
//!
//! Generic data access over a pluggable storage backend:
//!
//! ```text
//! Caller
//!   ↓  Arc<dyn GenericDao<D>>    (DTO-facing interface)
//! Dao<E, D, B>                   (keys, shape pairs, predicate rewrite, batching)
//!   ↓  StorageBackend<E>         (unit-of-work sessions over one table)
//! MemoryBackend / SqliteBackend
//! ```
//!
//! ## Structure
//!
//! ```text
//! src/
//!   traits.rs                    ← GenericDao / LoadAll traits
//!   matcher.rs                   ← batch key matching
//!   pool.rs                      ← SQLite connection pool
//!   impl/
//!     generic_dao_impl.rs        ← Dao and DaoBuilder
//!   storage/
//!     mod.rs                     ← StorageBackend / Session traits
//!     memory.rs                  ← in-process backend
//!     sqlite.rs                  ← SQLx SQLite backend
//! ```

pub mod matcher;
pub mod pool;
pub mod storage;
pub mod traits;
pub mod r#impl;

pub use matcher::{BatchMatch, KeyMatcher};
pub use pool::*;
pub use r#impl::{Dao, DaoBuilder};
pub use storage::{MemoryBackend, Session, SqliteBackend, StorageBackend, TableSchema};
pub use traits::*;
