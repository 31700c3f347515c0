//! quarry-migrate CLI
//!
//! Command-line tool for managing database migrations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quarry_orm::introspect::{Introspector, SqliteIntrospector};
use quarry_orm::{Connection, DatabaseConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quarry_migrate::prelude::*;
use quarry_migrate::{create_migration_file, LEDGER_TABLE};

/// Ordered, ledger-tracked database migrations.
#[derive(Parser)]
#[command(name = "quarry-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (e.g. `sqlite:app.db`).
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:db.sqlite3?mode=rwc"
    )]
    database: String,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Maximum pooled connections.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger table.
    Init,

    /// Apply pending migrations.
    Up,

    /// Roll back the most recently applied migrations.
    Down {
        /// Number of migrations to roll back.
        #[arg(short, long, default_value_t = 1)]
        steps: usize,
    },

    /// Show applied, pending and missing migrations.
    Status,

    /// Create an empty migration file.
    Make {
        /// Migration description, e.g. "create users".
        name: String,
    },

    /// List tables and their columns.
    Tables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Scaffolding needs no database.
    if let Commands::Make { name } = &cli.command {
        let path = create_migration_file(&cli.migrations_dir, name)?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = DatabaseConfig::new(&cli.database).max_connections(cli.max_connections);
    let conn = Connection::connect(&config).await?;
    let migrator = Migrator::new(conn.clone()).with_directory(&cli.migrations_dir);

    match cli.command {
        Commands::Init => {
            migrator.ensure_ledger().await?;
            info!("Ledger table ready.");
        }

        Commands::Up => {
            let applied = migrator.migrate_up().await?;
            for name in &applied {
                println!(" [+] {name}");
            }
        }

        Commands::Down { steps } => {
            let reverted = migrator.migrate_down(steps).await?;
            if reverted.is_empty() {
                info!("Nothing rolled back.");
            }
            for name in &reverted {
                println!(" [-] {name}");
            }
        }

        Commands::Status => {
            let status = migrator.status().await?;
            if status.applied.is_empty() && status.pending.is_empty() {
                info!("No migrations found.");
            }
            for migration in &status.applied {
                let marker = if status.missing.contains(&migration.name) {
                    "[?]"
                } else {
                    "[X]"
                };
                println!(
                    " {marker} {} ({})",
                    migration.name,
                    migration.ran_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            for name in &status.pending {
                println!(" [ ] {name}");
            }
        }

        Commands::Tables => {
            let introspector = SqliteIntrospector::new(conn.clone()).ignoring(LEDGER_TABLE);
            for table in introspector.list_tables().await? {
                println!("{table}");
                for column in introspector.list_columns(&table).await? {
                    println!(
                        "  {} {}{}{}",
                        column.name,
                        column.native_type,
                        if column.nullable { "" } else { " NOT NULL" },
                        column.key.map(|k| format!(" {k}")).unwrap_or_default()
                    );
                }
            }
        }

        Commands::Make { .. } => {}
    }

    conn.end().await;
    Ok(())
}
