//! Migration engine
//!
//! Rebuilds one table to match its target definition while keeping every
//! row whose columns survive. The caller owns the connection and the
//! enclosing transaction; any failure here propagates unchanged and leaves
//! the transaction uncommitted.
//!
//! The step order is load-bearing. From the moment the drop batch runs
//! until reprojection completes, the original rows live only in the
//! staging table, so nothing in between may drop it.

use std::collections::HashSet;

use crate::db::connection::DatabaseConnection;
use crate::error::Result;
use crate::provider::SqlProvider;
use crate::schema::types::TargetTable;

/// Rebuild `target`'s table to match its definition.
///
/// Preconditions: the connection has a pending transaction opened by the
/// caller under read-committed isolation or stricter, and `provider`
/// matches the connection's engine.
pub async fn update_table(
    connection: &DatabaseConnection,
    target: &TargetTable,
    provider: &dyn SqlProvider,
) -> Result<()> {
    let table_name = &target.name;
    let staging_name = provider.staging_table_name(table_name);

    tracing::info!(table = %table_name, "Rebuilding table");

    // First-time tables get created here and take a no-op rebuild below.
    connection
        .execute(&provider.create_table_sql(target, true))
        .await?;

    // Columns as the table currently stands, pre-rebuild.
    let existing_columns = connection
        .fetch_string_column(&provider.column_names_sql(table_name))
        .await?;

    // Detach inbound foreign keys, relocate all rows into the staging
    // table, remove the original.
    let fk_statement = provider
        .migrate_table_sql(connection, table_name, &staging_name)
        .await?;
    connection.execute_batch(&fk_statement.drop_sql()).await?;

    // Recreate from the target definition, empty.
    connection
        .execute(&provider.create_table_sql(target, false))
        .await?;

    // Reattach foreign keys from other tables; the new DDL already
    // declares the table's own.
    if fk_statement.has_creates() {
        connection.execute_batch(&fk_statement.create_sql()).await?;
    }

    // Columns of the rebuilt table. Re-introspected rather than derived
    // from `target` so the copy list reflects what the engine actually
    // created, engine-added columns included.
    let model_columns = connection
        .fetch_string_column(&provider.column_names_sql(table_name))
        .await?;

    let active_fields = active_fields(&existing_columns, &model_columns);

    if active_fields.is_empty() {
        // Nothing survives the rebuild, but the staging table still must
        // not outlive this call.
        connection
            .execute(&provider.drop_table_sql(&staging_name))
            .await?;
        tracing::warn!(table = %table_name, "No surviving columns, staged rows discarded");
        return Ok(());
    }

    let column_list: Vec<String> = active_fields
        .iter()
        .map(|c| provider.quote_identifier(c))
        .collect();

    connection
        .execute_batch(&provider.insert_into_sql(table_name, &staging_name, &column_list.join(", ")))
        .await?;

    tracing::info!(
        table = %table_name,
        columns = active_fields.len(),
        "Table rebuilt"
    );

    Ok(())
}

/// The columns carried from the old table into the rebuilt one: the
/// intersection of both column sets, in the old table's order. Columns
/// only in the old table are dropped with their data; columns only in the
/// new table take their default or NULL.
pub fn active_fields(existing_columns: &[String], model_columns: &[String]) -> Vec<String> {
    let model_set: HashSet<&str> = model_columns.iter().map(String::as_str).collect();

    existing_columns
        .iter()
        .filter(|column| model_set.contains(column.as_str()))
        .cloned()
        .collect()
}
