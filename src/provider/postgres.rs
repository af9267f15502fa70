//! PostgreSQL dialect provider
//!
//! Reference provider. Inbound foreign keys are enumerated through the
//! `pg_catalog` tables, with the constraint's key arrays unnested side by
//! side so every row carries one correctly paired parent/referenced
//! column; rows are staged with `CREATE TABLE ... AS SELECT`; constraint
//! checking is suspended for the copy by switching
//! `session_replication_role` to `replica` (requires a role allowed to
//! set it, e.g. a superuser).
//!
//! Every generated statement qualifies table names with the configured
//! schema, so the rebuild targets the same schema the introspection
//! queries filter on regardless of the session search path.
//!
//! PostgreSQL has no identity-insert toggle. Instead, auto-increment
//! columns are rendered as `GENERATED BY DEFAULT AS IDENTITY`, which
//! accepts the explicit key values carried over from the staging table.
//! The backing sequence is not advanced by the copy.
// TODO: advance identity sequences past the copied keys (setval from the
// max migrated value) so post-migration inserts cannot collide.

use async_trait::async_trait;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::provider::{group_constraints, FkConstraint, FkStatement, ForeignKeyRow, SqlProvider};

/// One row per constraint column pair, keyed on the referenced table.
/// `conkey` and `confkey` are unnested together so parent and referenced
/// columns stay paired by ordinal; a per-column cross join of the
/// information_schema views would duplicate the pairs of a composite key.
const FOREIGN_KEY_SQL: &str = r#"
    SELECT
        con.conname AS constraint_name,
        parent.relname AS parent_table,
        pa.attname AS parent_column,
        ref.relname AS ref_table,
        ra.attname AS ref_column
    FROM
        pg_constraint con
    JOIN pg_class parent ON parent.oid = con.conrelid
    JOIN pg_class ref ON ref.oid = con.confrelid
    JOIN pg_namespace ns ON ns.oid = ref.relnamespace
    CROSS JOIN LATERAL unnest(con.conkey, con.confkey)
        WITH ORDINALITY AS cols(parent_attnum, ref_attnum, ord)
    JOIN pg_attribute pa
        ON pa.attrelid = con.conrelid AND pa.attnum = cols.parent_attnum
    JOIN pg_attribute ra
        ON ra.attrelid = con.confrelid AND ra.attnum = cols.ref_attnum
    WHERE
        con.contype = 'f'
        AND ns.nspname = $1
        AND ref.relname = $2
    ORDER BY parent.relname, con.conname, cols.ord
"#;

/// PostgreSQL provider
#[derive(Debug, Clone)]
pub struct PostgresProvider {
    schema: String,
}

impl Default for PostgresProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresProvider {
    /// Create a provider for the `public` schema
    pub fn new() -> Self {
        Self {
            schema: "public".to_string(),
        }
    }

    /// Create a provider for a specific schema
    pub fn with_schema(schema: &str) -> Self {
        Self {
            schema: schema.to_string(),
        }
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
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.qualify_table(&constraint.parent_table),
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
                    self.qualify_table(&constraint.parent_table),
                    self.quote_identifier(&constraint.name),
                    columns.join(", "),
                    self.qualify_table(&constraint.ref_table),
                    ref_columns.join(", ")
                ));
            }
        }

        // Stage the rows, then remove the original table.
        fk_statement.drop_statements.push(format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            self.qualify_table(staging),
            self.qualify_table(current)
        ));
        fk_statement
            .drop_statements
            .push(format!("DROP TABLE {}", self.qualify_table(current)));

        fk_statement
    }
}

#[async_trait]
impl SqlProvider for PostgresProvider {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_names_sql(&self, table: &str) -> String {
        format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}' \
             ORDER BY ordinal_position",
            self.schema, table
        )
    }

    async fn migrate_table_sql(
        &self,
        connection: &DatabaseConnection,
        current: &str,
        staging: &str,
    ) -> Result<FkStatement> {
        let pool = match connection {
            DatabaseConnection::Postgres(pool) => pool,
            _ => {
                return Err(Error::DialectError(
                    "PostgresProvider requires a PostgreSQL connection".to_string(),
                ))
            }
        };

        let rows = sqlx::query_as::<_, ForeignKeyRow>(FOREIGN_KEY_SQL)
            .bind(&self.schema)
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
            "SET session_replication_role = replica; \
             INSERT INTO {into} ({columns}) SELECT {columns} FROM {from}; \
             DROP TABLE {from}; \
             SET session_replication_role = DEFAULT",
            into = self.qualify_table(into_table),
            from = self.qualify_table(from_table),
            columns = comma_separated_columns
        )
    }

    fn auto_increment_clause(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    fn qualify_table(&self, name: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(&self.schema),
            self.quote_identifier(name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ColumnDef, ForeignKeyDef, TargetTable};
    use pretty_assertions::assert_eq;

    fn provider() -> PostgresProvider {
        PostgresProvider::new()
    }

    #[test]
    fn test_column_names_sql() {
        let sql = provider().column_names_sql("User");

        assert!(sql.contains("information_schema.columns"));
        assert!(sql.contains("table_name = 'User'"));
        assert!(sql.contains("table_schema = 'public'"));
        assert!(sql.contains("ORDER BY ordinal_position"));
    }

    #[test]
    fn test_column_names_sql_custom_schema() {
        let sql = PostgresProvider::with_schema("app").column_names_sql("User");
        assert!(sql.contains("table_schema = 'app'"));
    }

    #[test]
    fn test_foreign_key_query_pairs_composite_columns() {
        // The key arrays must be unnested together; joining the
        // information_schema views on constraint name alone yields the
        // parent x referenced cross product for a composite key.
        assert!(FOREIGN_KEY_SQL.contains("unnest(con.conkey, con.confkey)"));
        assert!(FOREIGN_KEY_SQL.contains("WITH ORDINALITY"));
        assert!(FOREIGN_KEY_SQL.contains("ORDER BY parent.relname, con.conname, cols.ord"));
        assert!(!FOREIGN_KEY_SQL.contains("information_schema"));
    }

    #[test]
    fn test_insert_into_ordering() {
        let sql = provider().insert_into_sql("User", "UserTmp", "\"Id\", \"UserName\"");

        let disable = sql.find("SET session_replication_role = replica").unwrap();
        let insert = sql.find("INSERT INTO \"public\".\"User\"").unwrap();
        let drop = sql.find("DROP TABLE \"public\".\"UserTmp\"").unwrap();
        let restore = sql.find("SET session_replication_role = DEFAULT").unwrap();

        assert!(disable < insert);
        assert!(insert < drop);
        assert!(drop < restore);
        assert!(sql.contains("SELECT \"Id\", \"UserName\" FROM \"public\".\"UserTmp\""));
    }

    #[test]
    fn test_staging_table_name() {
        assert_eq!(provider().staging_table_name("User"), "UserTmp");
    }

    #[test]
    fn test_create_table_sql() {
        let mut table = TargetTable::new("User");
        table.add_column(ColumnDef::new("Id", "INTEGER").primary_key());
        table.add_column(ColumnDef::new("UserName", "VARCHAR(10)"));
        table.add_column(ColumnDef::new("Email", "VARCHAR(30)").nullable(true));

        let sql = provider().create_table_sql(&table, false);

        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"User\" (\
             \"Id\" INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, \
             \"UserName\" VARCHAR(10) NOT NULL, \
             \"Email\" VARCHAR(30))"
        );
    }

    #[test]
    fn test_create_table_if_not_exists() {
        let mut table = TargetTable::new("User");
        table.add_column(ColumnDef::new("Id", "INTEGER").primary_key());

        let sql = provider().create_table_sql(&table, true);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"User\""));
    }

    #[test]
    fn test_create_table_with_foreign_key() {
        let mut table = TargetTable::new("Post");
        table.add_column(ColumnDef::new("Id", "INTEGER").primary_key());
        table.add_column(ColumnDef::new("AuthorId", "INTEGER"));
        table.add_foreign_key(ForeignKeyDef {
            name: "fk_post_author_id".to_string(),
            columns: vec!["AuthorId".to_string()],
            ref_table: "User".to_string(),
            ref_columns: vec!["Id".to_string()],
            on_delete: Some("CASCADE".to_string()),
            on_update: None,
        });

        let sql = provider().create_table_sql(&table, false);

        assert!(sql.contains(
            "CONSTRAINT \"fk_post_author_id\" FOREIGN KEY (\"AuthorId\") \
             REFERENCES \"public\".\"User\" (\"Id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_drop_table_sql() {
        assert_eq!(
            provider().drop_table_sql("UserTmp"),
            "DROP TABLE \"public\".\"UserTmp\""
        );
    }

    fn constraint(name: &str, parent: &str, column: &str, ref_table: &str) -> FkConstraint {
        FkConstraint {
            name: name.to_string(),
            parent_table: parent.to_string(),
            columns: vec![column.to_string()],
            ref_table: ref_table.to_string(),
            ref_columns: vec!["Id".to_string()],
        }
    }

    #[test]
    fn test_fk_statement_detaches_and_reattaches() {
        let fk = provider().build_fk_statement(
            vec![constraint("fk_post_author", "Post", "AuthorId", "User")],
            "User",
            "UserTmp",
        );

        assert_eq!(
            fk.drop_statements,
            vec![
                "ALTER TABLE \"public\".\"Post\" DROP CONSTRAINT \"fk_post_author\"".to_string(),
                "CREATE TABLE \"public\".\"UserTmp\" AS SELECT * FROM \"public\".\"User\""
                    .to_string(),
                "DROP TABLE \"public\".\"User\"".to_string(),
            ]
        );
        assert_eq!(
            fk.create_statements,
            vec![
                "ALTER TABLE \"public\".\"Post\" ADD CONSTRAINT \"fk_post_author\" \
                 FOREIGN KEY (\"AuthorId\") REFERENCES \"public\".\"User\" (\"Id\")"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_fk_statement_excludes_self_reference() {
        let fk = provider().build_fk_statement(
            vec![constraint("fk_user_manager", "User", "ManagerId", "User")],
            "User",
            "UserTmp",
        );

        // Detached like any other constraint, but never reattached: the
        // rebuilt table declares it itself.
        assert_eq!(fk.drop_statements.len(), 3);
        assert!(!fk.has_creates());
    }

    #[test]
    fn test_fk_statement_zero_foreign_keys() {
        let fk = provider().build_fk_statement(Vec::new(), "User", "UserTmp");

        assert!(!fk.has_creates());
        assert_eq!(fk.create_sql(), "");
        assert_eq!(
            fk.drop_sql(),
            "CREATE TABLE \"public\".\"UserTmp\" AS SELECT * FROM \"public\".\"User\"; \
             DROP TABLE \"public\".\"User\""
        );
    }

    #[test]
    fn test_fk_statement_preserves_catalog_order() {
        let fk = provider().build_fk_statement(
            vec![
                constraint("fk_comment_author", "Comment", "AuthorId", "User"),
                constraint("fk_post_author", "Post", "AuthorId", "User"),
            ],
            "User",
            "UserTmp",
        );

        assert!(fk.drop_statements[0].contains("\"Comment\""));
        assert!(fk.drop_statements[1].contains("\"Post\""));
        assert!(fk.create_statements[0].contains("\"Comment\""));
        assert!(fk.create_statements[1].contains("\"Post\""));
    }

    #[test]
    fn test_statements_follow_configured_schema() {
        // Introspection filters on the configured schema, so the generated
        // statements must resolve there too instead of via search_path;
        // otherwise the rebuilt table lands elsewhere, the column
        // intersection comes back empty, and the staged rows are lost.
        let provider = PostgresProvider::with_schema("app");

        let fk = provider.build_fk_statement(Vec::new(), "User", "UserTmp");
        assert_eq!(
            fk.drop_sql(),
            "CREATE TABLE \"app\".\"UserTmp\" AS SELECT * FROM \"app\".\"User\"; \
             DROP TABLE \"app\".\"User\""
        );

        let mut table = TargetTable::new("User");
        table.add_column(ColumnDef::new("Id", "INTEGER").primary_key());
        assert!(provider
            .create_table_sql(&table, false)
            .starts_with("CREATE TABLE \"app\".\"User\""));

        let insert = provider.insert_into_sql("User", "UserTmp", "\"Id\"");
        assert!(insert.contains("INSERT INTO \"app\".\"User\""));
        assert!(insert.contains("FROM \"app\".\"UserTmp\""));
        assert!(insert.contains("DROP TABLE \"app\".\"UserTmp\""));

        assert_eq!(provider.drop_table_sql("UserTmp"), "DROP TABLE \"app\".\"UserTmp\"");
    }
}
