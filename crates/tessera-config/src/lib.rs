//! # Tessera Config
//!
//! Configuration management for Tessera.
//! Supports layered configuration from files and environment variables,
//! validation of every loaded value, and runtime refresh.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
