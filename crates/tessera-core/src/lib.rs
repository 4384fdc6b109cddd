//! # Tessera Core
//!
//! Storage-independent building blocks for the Tessera generic DAO:
//! column values, record shapes, primary keys, the predicate algebra,
//! entity/DTO shape pairing and the unified error type.
//! Nothing in this crate performs I/O.

pub mod error;
pub mod hierarchy;
pub mod key;
pub mod predicate;
pub mod record;
pub mod result;
pub mod telemetry;
pub mod value;

pub use error::*;
pub use hierarchy::*;
pub use key::*;
pub use predicate::*;
pub use record::*;
pub use result::*;
pub use telemetry::*;
pub use value::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
