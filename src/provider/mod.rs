//! SQL dialect providers
//!
//! Each provider generates the engine-specific SQL a table rebuild needs:
//! column-name introspection, foreign-key detach/reattach plus row staging,
//! and the final reprojection batch. Providers hold no connection state;
//! a connection is passed in only where introspection is unavoidable.
//!
//! New engines are supported by adding new provider variants, never by
//! branching inside the migration engine.

use async_trait::async_trait;
use sqlx::FromRow;

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::schema::types::{ColumnDef, TargetTable};

pub mod mysql;
pub mod postgres;

// Re-export concrete providers
pub use mysql::MySqlProvider;
pub use postgres::PostgresProvider;

/// Separator used when a statement list is joined into one batch
pub const STATEMENT_SEPARATOR: &str = "; ";

/// The foreign-key handling for one table rebuild.
///
/// Built fresh by [`SqlProvider::migrate_table_sql`] for every migration
/// call and discarded after use. Statements are kept as lists and joined
/// with a defined separator, so zero introspected foreign keys simply
/// yields an empty reattach batch.
#[derive(Debug, Clone, Default)]
pub struct FkStatement {
    /// Detach statements for every inbound foreign key, in catalog order,
    /// followed by the stage-and-drop clauses for the migrated table
    pub drop_statements: Vec<String>,
    /// Reattach statements for foreign keys whose parent table is not the
    /// migrated table itself
    pub create_statements: Vec<String>,
}

impl FkStatement {
    /// The full detach + stage-and-drop batch
    pub fn drop_sql(&self) -> String {
        self.drop_statements.join(STATEMENT_SEPARATOR)
    }

    /// The reattach batch; empty when no eligible foreign keys exist
    pub fn create_sql(&self) -> String {
        self.create_statements.join(STATEMENT_SEPARATOR)
    }

    /// Whether any foreign keys need reattaching after the rebuild
    pub fn has_creates(&self) -> bool {
        !self.create_statements.is_empty()
    }
}

/// One row of a dialect's inbound foreign-key introspection query.
///
/// Multi-column constraints produce one row per column pair, ordered by
/// constraint ordinal position.
#[derive(Debug, FromRow)]
pub(crate) struct ForeignKeyRow {
    pub constraint_name: String,
    pub parent_table: String,
    pub parent_column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// An introspected foreign-key constraint, columns in ordinal order
#[derive(Debug)]
pub(crate) struct FkConstraint {
    pub name: String,
    pub parent_table: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

/// Group per-column introspection rows into whole constraints, preserving
/// the query's result order
pub(crate) fn group_constraints(rows: Vec<ForeignKeyRow>) -> Vec<FkConstraint> {
    let mut constraints: Vec<FkConstraint> = Vec::new();

    for row in rows {
        match constraints.last_mut() {
            Some(last) if last.name == row.constraint_name && last.parent_table == row.parent_table => {
                last.columns.push(row.parent_column);
                last.ref_columns.push(row.ref_column);
            }
            _ => constraints.push(FkConstraint {
                name: row.constraint_name,
                parent_table: row.parent_table,
                columns: vec![row.parent_column],
                ref_table: row.ref_table,
                ref_columns: vec![row.ref_column],
            }),
        }
    }

    constraints
}

/// Trait for engine-specific SQL generation
#[async_trait]
pub trait SqlProvider: Send + Sync {
    /// Returns the provider name
    fn name(&self) -> &'static str;

    /// Returns a query that yields one row per column of `table`, in
    /// ordinal position order. Only valid for tables known to exist.
    fn column_names_sql(&self, table: &str) -> String;

    /// Introspect every foreign key referencing `current` and build the
    /// rebuild batches: detach all of them and relocate the rows into
    /// `staging` (drop side), reattach those not declared by the migrated
    /// table itself (create side).
    async fn migrate_table_sql(
        &self,
        connection: &DatabaseConnection,
        current: &str,
        staging: &str,
    ) -> Result<FkStatement>;

    /// Returns the reprojection batch. Statement order is mandatory:
    /// disable constraint checking, copy exactly the given column list
    /// from `from_table` into `into_table`, drop `from_table`, restore
    /// constraint checking. The column list is inserted verbatim into
    /// both the insert and select lists.
    fn insert_into_sql(
        &self,
        into_table: &str,
        from_table: &str,
        comma_separated_columns: &str,
    ) -> String;

    /// Returns the auto-increment clause appended to primary-key columns
    fn auto_increment_clause(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.)
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name)
    }

    /// A table reference for generated DDL/DML. Dialects with a configured
    /// schema override this so generated statements resolve against the
    /// same schema the introspection queries filter on, not the session
    /// search path.
    fn qualify_table(&self, name: &str) -> String {
        self.quote_identifier(name)
    }

    /// Name of the staging table used while rebuilding `table`
    fn staging_table_name(&self, table: &str) -> String {
        format!("{}Tmp", table)
    }

    /// Generates column definition SQL
    fn column_definition(&self, column: &ColumnDef) -> String {
        let mut parts = vec![self.quote_identifier(&column.name), column.data_type.clone()];

        if column.primary_key {
            if column.auto_increment {
                parts.push(self.auto_increment_clause().to_string());
            }
            parts.push("PRIMARY KEY".to_string());
        }

        if !column.nullable && !column.primary_key {
            parts.push("NOT NULL".to_string());
        }

        if column.unique && !column.primary_key {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }

        parts.join(" ")
    }

    /// Generates SQL for creating a table from its target definition,
    /// including the foreign keys the definition declares
    fn create_table_sql(&self, table: &TargetTable, if_not_exists: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.qualify_table(&table.name));
        sql.push_str(" (");

        let mut defs: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        for fk in &table.foreign_keys {
            let columns: Vec<String> = fk.columns.iter().map(|c| self.quote_identifier(c)).collect();
            let ref_columns: Vec<String> =
                fk.ref_columns.iter().map(|c| self.quote_identifier(c)).collect();

            let mut def = format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote_identifier(&fk.name),
                columns.join(", "),
                self.qualify_table(&fk.ref_table),
                ref_columns.join(", ")
            );

            if let Some(on_delete) = &fk.on_delete {
                def.push_str(&format!(" ON DELETE {}", on_delete));
            }
            if let Some(on_update) = &fk.on_update {
                def.push_str(&format!(" ON UPDATE {}", on_update));
            }

            defs.push(def);
        }

        sql.push_str(&defs.join(", "));
        sql.push(')');
        sql
    }

    /// Generates SQL for dropping a table
    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.qualify_table(table))
    }
}
