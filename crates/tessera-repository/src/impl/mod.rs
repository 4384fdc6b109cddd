//! DAO implementations.
//!
//! Trait definitions live in the parent module (`traits.rs`).
//! This module contains concrete structs that implement those traits.

pub mod generic_dao_impl;

pub use generic_dao_impl::{Dao, DaoBuilder};
