//! MySQL dialect provider
//!
//! Inbound foreign keys are enumerated through
//! `INFORMATION_SCHEMA.KEY_COLUMN_USAGE` keyed on the referenced table;
//! rows are staged with `CREATE TABLE ... AS SELECT`; constraint checking
//! is suspended for the copy with `SET FOREIGN_KEY_CHECKS = 0`.
//!
//! MySQL needs no identity-insert toggle: `AUTO_INCREMENT` columns accept
//! explicit values natively, and the counter moves past the largest
//! inserted value on its own.
//!
//! Limitation: MySQL DDL statements commit implicitly, so the surrounding
//! transaction cannot roll a partially rebuilt table back the way it can
//! on PostgreSQL. A failure mid-rebuild can leave the staging table
//! behind; rerunning the migration after removing it recovers.

use async_trait::async_trait;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::provider::{group_constraints, FkConstraint, FkStatement, ForeignKeyRow, SqlProvider};

/// MySQL provider
#[derive(Debug, Clone, Default)]
pub struct MySqlProvider;

impl MySqlProvider {
    /// Create a new MySQL provider
    pub fn new() -> Self {
        Self
    }

    /// Build the detach/stage-and-drop and reattach batches from the
    /// introspected constraints
    pub(crate) fn build_fk_statement(
        &self,
        constraints: Vec<FkConstraint>,
        current: &str,
        staging: &str,
    ) -> FkStatement {
        let mut fk_statement = FkStatement::default();

        for constraint in constraints {
            fk_statement.drop_statements.push(format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                self.quote_identifier(&constraint.parent_table),
                self.quote_identifier(&constraint.name)
            ));

            // The rebuilt table declares its own foreign keys, so a
            // self-reference must not be reattached on top of them.
            if constraint.parent_table != current {
                let columns: Vec<String> = constraint
                    .columns
                    .iter()
                    .map(|c| self.quote_identifier(c))
                    .collect();
                let ref_columns: Vec<String> = constraint
                    .ref_columns
                    .iter()
                    .map(|c| self.quote_identifier(c))
                    .collect();

                fk_statement.create_statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote_identifier(&constraint.parent_table),
                    self.quote_identifier(&constraint.name),
                    columns.join(", "),
                    self.quote_identifier(&constraint.ref_table),
                    ref_columns.join(", ")
                ));
            }
        }

        // Stage the rows, then remove the original table. The detach above
        // must already have happened or the drop would be rejected.
        fk_statement.drop_statements.push(format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            self.quote_identifier(staging),
            self.quote_identifier(current)
        ));
        fk_statement
            .drop_statements
            .push(format!("DROP TABLE {}", self.quote_identifier(current)));

        fk_statement
    }
}

#[async_trait]
impl SqlProvider for MySqlProvider {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn column_names_sql(&self, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = '{}' \
             ORDER BY ORDINAL_POSITION",
            table
        )
    }

    async fn migrate_table_sql(
        &self,
        connection: &DatabaseConnection,
        current: &str,
        staging: &str,
    ) -> Result<FkStatement> {
        let pool = match connection {
            DatabaseConnection::MySql(pool) => pool,
            _ => {
                return Err(Error::DialectError(
                    "MySqlProvider requires a MySQL connection".to_string(),
                ))
            }
        };

        // One row per constraint column, keyed on the referenced table
        let sql = r#"
            SELECT
                kcu.CONSTRAINT_NAME AS constraint_name,
                kcu.TABLE_NAME AS parent_table,
                kcu.COLUMN_NAME AS parent_column,
                kcu.REFERENCED_TABLE_NAME AS ref_table,
                kcu.REFERENCED_COLUMN_NAME AS ref_column
            FROM
                INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
            WHERE
                kcu.TABLE_SCHEMA = DATABASE()
                AND kcu.REFERENCED_TABLE_NAME = ?
            ORDER BY kcu.TABLE_NAME, kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#;

        let rows = sqlx::query_as::<_, ForeignKeyRow>(sql)
            .bind(current)
            .fetch_all(pool)
            .await?;

        Ok(self.build_fk_statement(group_constraints(rows), current, staging))
    }

    fn insert_into_sql(
        &self,
        into_table: &str,
        from_table: &str,
        comma_separated_columns: &str,
    ) -> String {
        format!(
            "SET FOREIGN_KEY_CHECKS = 0; \
             INSERT INTO {into} ({columns}) SELECT {columns} FROM {from}; \
             DROP TABLE {from}; \
             SET FOREIGN_KEY_CHECKS = 1",
            into = self.quote_identifier(into_table),
            from = self.quote_identifier(from_table),
            columns = comma_separated_columns
        )
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name)
    }
}
