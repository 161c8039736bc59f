//! Zapline Storage - PostgreSQL persistence layer
//!
//! This crate provides the database pool, models, and repositories for
//! campaigns, targets, leads, and gateway instances. The target repository
//! carries the atomic claim/complete operations the dispatcher relies on.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
