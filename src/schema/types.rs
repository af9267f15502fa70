//! Type definitions for target table schemas
//!
//! A `TargetTable` is the desired structure for one table, derived from a
//! model definition. It is supplied to the migration engine fully resolved
//! and stays immutable for the duration of a run.

use serde::{Deserialize, Serialize};

/// The desired structure for one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetTable {
    pub name: String,
    #[serde(rename = "column")]
    pub columns: Vec<ColumnDef>,
    #[serde(rename = "foreign_key", default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TargetTable {
    /// Create a new target table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column to the table
    pub fn add_column(&mut self, column: ColumnDef) {
        self.columns.push(column);
    }

    /// Add a foreign key to the table
    pub fn add_foreign_key(&mut self, fk: ForeignKeyDef) {
        self.foreign_keys.push(fk);
    }

    /// The column names declared by this table, in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A column of a target table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Raw SQL type, e.g. `INTEGER` or `VARCHAR(255)`
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
}

impl ColumnDef {
    /// Create a new column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the column as an auto-incrementing primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = true;
        self
    }

    /// Set a default value for the column
    pub fn default_value(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// A foreign key declared by a target table.
///
/// These are rendered into the rebuilt table's DDL, which is why the
/// migration engine never reattaches a detached self-referencing constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
}
