//! table_sync command-line entry point

use clap::Parser;

use table_sync::error::Result;
use table_sync::{config, logging, Migrator};

/// Rebuild database tables to match their target definitions
#[derive(Parser, Debug)]
#[command(name = "table_sync", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "table_sync.toml")]
    config: String,

    /// Migrate every table in the manifest
    #[arg(long)]
    all: bool,

    /// Migrate only the named table (repeatable); overrides the config
    #[arg(long = "table", value_name = "NAME")]
    tables: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_from_file(&cli.config)?;
    if cli.all {
        config.migration.update_all = true;
    }
    if !cli.tables.is_empty() {
        config.migration.update_all = false;
        config.migration.tables = Some(cli.tables);
    }

    logging::init_logging(&config.logging)?;

    let migrator = Migrator::new(config).await?;
    migrator.sync().await?;

    println!("Database has been updated!");
    Ok(())
}
