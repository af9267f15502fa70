//! Database connection handling
//!
//! This module provides functionality to establish and manage database
//! connections. A full migration batch runs inside one `BEGIN`/`COMMIT`
//! pair issued as plain SQL, so the pool is capped at a single connection;
//! every statement of the batch must share that connection for the
//! transaction to span them.

use sqlx::{
    mysql::MySqlPoolOptions, postgres::PgPoolOptions, Executor, MySql, Pool, Postgres,
};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Enumeration of supported database types
#[derive(Debug, Clone)]
pub enum DatabaseConnection {
    Postgres(Pool<Postgres>),
    MySql(Pool<MySql>),
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        match config.driver.as_str() {
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(std::time::Duration::from_secs(timeout_seconds))
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::Postgres(pool))
            }
            "mysql" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(std::time::Duration::from_secs(timeout_seconds))
                    .connect(&config.url)
                    .await?;

                Ok(DatabaseConnection::MySql(pool))
            }
            _ => Err(Error::DatabaseError(format!(
                "Unsupported database driver: {}",
                config.driver
            ))),
        }
    }

    /// Execute a single SQL statement
    pub async fn execute(&self, sql: &str) -> Result<()> {
        match self {
            DatabaseConnection::Postgres(pool) => {
                sqlx::query(sql).execute(pool).await?;
                Ok(())
            }
            DatabaseConnection::MySql(pool) => {
                sqlx::query(sql).execute(pool).await?;
                Ok(())
            }
        }
    }

    /// Execute a batch of semicolon-separated statements.
    ///
    /// Raw text goes through the unprepared query path, which accepts
    /// multiple statements in one round trip.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        match self {
            DatabaseConnection::Postgres(pool) => {
                pool.execute(sql).await?;
                Ok(())
            }
            DatabaseConnection::MySql(pool) => {
                pool.execute(sql).await?;
                Ok(())
            }
        }
    }

    /// Run a query that yields a single text column, collecting the values
    /// in result order
    pub async fn fetch_string_column(&self, sql: &str) -> Result<Vec<String>> {
        match self {
            DatabaseConnection::Postgres(pool) => {
                let rows = sqlx::query_scalar::<_, String>(sql).fetch_all(pool).await?;
                Ok(rows)
            }
            DatabaseConnection::MySql(pool) => {
                let rows = sqlx::query_scalar::<_, String>(sql).fetch_all(pool).await?;
                Ok(rows)
            }
        }
    }
}
