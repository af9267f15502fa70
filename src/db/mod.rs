//! Database module for table_sync
//!
//! This module handles database connections and SQL execution.

pub mod connection;

// Re-export key types
pub use connection::DatabaseConnection;
