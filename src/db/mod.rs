//! SQLite persistence.
//!
//! This module provides:
//! - Database initialization, pragmas and schema migration
//! - The `Repository` for strategies, history, metric configuration and results

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
