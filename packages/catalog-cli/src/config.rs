use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, e.g. `sqlite://catalog.db?mode=rwc`
    pub database_url: String,
    /// Actor recorded on audit entries
    pub actor: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            actor: env::var("CATALOG_ACTOR").unwrap_or_else(|_| "cli".to_string()),
        })
    }
}
