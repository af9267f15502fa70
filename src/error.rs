//! Error types for table_sync

use thiserror::Error;

/// Result type for table_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table_sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Dialect error: {0}")]
    DialectError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Convert TOML deserialization errors to table_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
