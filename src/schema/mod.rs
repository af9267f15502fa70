//! Schema module for table_sync
//!
//! This module holds the target schema model and the manifest loader.

pub mod manifest;
pub mod types;

// Re-export key types
pub use manifest::load_manifest;
pub use types::{ColumnDef, ForeignKeyDef, TargetTable};
