//! Operator CLI for the catalog.
//!
//! Runs the integrity maintenance pass and the interactive identity
//! corrections against a SQLite catalog. Every command prints one JSON
//! object on stdout; logs go to stderr.

mod config;

use anyhow::{Context, Result};
use catalog::{Catalog, CatalogConfig, CatalogError, ItemId, ProviderRegistry, SqliteStore};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Catalog identity maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check merge and parent integrity
    Integrity {
        /// Repair what is found
        #[arg(long)]
        fix: bool,
    },

    /// Follow an item's merges to the live item
    Resolve { id: i64 },

    /// Merge an item into a target
    Merge { id: i64, target: i64 },

    /// Clear an item's merge pointer
    Unmerge { id: i64 },

    /// Change an item's model, keeping its identity
    Recast { id: i64, model: String },

    /// Soft-delete an item
    Delete { id: i64 },

    /// Clear an item's deleted flag
    Undelete { id: i64 },

    /// Show an item's audit history
    History { id: i64 },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn output<T: Serialize>(data: T) -> Result<()> {
    let resp = Response {
        success: true,
        message: None,
        data: Some(data),
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

/// Validation and lookup failures are reported as JSON, not as a process
/// error.
fn output_error(err: &CatalogError) -> Result<()> {
    let resp: Response<()> = Response {
        success: false,
        message: Some(err.to_string()),
        data: None,
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,catalog=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let cli = Cli::parse();
    let catalog = connect().await?;

    match cli.command {
        Commands::Integrity { fix } => cmd_integrity(&catalog, fix).await,
        Commands::Resolve { id } => cmd_resolve(&catalog, ItemId(id)).await,
        Commands::Merge { id, target } => {
            respond(catalog.merge(ItemId(id), ItemId(target)).await)
        }
        Commands::Unmerge { id } => respond(catalog.unmerge(ItemId(id)).await),
        Commands::Recast { id, model } => respond(catalog.recast(ItemId(id), &model).await),
        Commands::Delete { id } => respond(catalog.soft_delete(ItemId(id)).await),
        Commands::Undelete { id } => respond(catalog.undelete(ItemId(id)).await),
        Commands::History { id } => respond(catalog.history(ItemId(id)).await),
    }
}

async fn connect() -> Result<Catalog<SqliteStore>> {
    let config = Config::from_env()?;
    let store = SqliteStore::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!(actor = %config.actor, "connected to catalog database");

    // Maintenance commands never scrape, so no providers are registered
    let registry = ProviderRegistry::builder().build();
    Ok(Catalog::with_config(
        store,
        registry,
        CatalogConfig::default().with_actor(config.actor),
    ))
}

/// Print a successful result as JSON; print a catalog error as a failed
/// response unless it is a storage failure.
fn respond<T: Serialize>(result: catalog::Result<T>) -> Result<()> {
    match result {
        Ok(data) => output(data),
        Err(e @ CatalogError::Storage(_)) => Err(e).context("storage failure"),
        Err(e) => output_error(&e),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_integrity(catalog: &Catalog<SqliteStore>, fix: bool) -> Result<()> {
    let report = catalog
        .check_integrity(fix)
        .await
        .context("integrity check failed")?;
    output(report)
}

#[derive(Serialize)]
struct Resolved {
    item: i64,
    resolved: i64,
    url: String,
}

async fn cmd_resolve(catalog: &Catalog<SqliteStore>, id: ItemId) -> Result<()> {
    let item = match catalog.get_item(id).await {
        Ok(item) => item,
        Err(e) => return respond::<()>(Err(e)),
    };
    respond(catalog.resolve_final(&item).await.map(|last| Resolved {
        item: id.0,
        resolved: last.id.0,
        url: last.url(),
    }))
}
