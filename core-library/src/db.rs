//! # Database Connection Pool Module
//!
//! SQLite connection pooling for the collection database.
//!
//! ## Features
//!
//! - **WAL Mode**: the tracker's web process can keep reading while a batch
//!   run writes
//! - **Busy Timeout**: writers wait for a lock instead of failing immediately
//! - **Health Checks**: connection validation on startup
//!
//! The tracker owns the schema. [`create_test_pool`] creates a minimal
//! `games` table so tests have something to run against.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{DatabaseConfig, create_pool};
//!
//! let pool = create_pool(DatabaseConfig::new("collection.db")).await?;
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimal `games` table used by tests and fixtures.
pub const GAMES_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    platform TEXT NOT NULL DEFAULT '',
    cover_image_url TEXT,
    release_date TEXT,
    genre TEXT,
    description TEXT,
    critic_rating INTEGER,
    market_price REAL
)
"#;

/// Database configuration for SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL, `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    /// How long a writer waits on a locked database
    pub busy_timeout: Duration,

    /// Create the file if it does not exist
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// Configuration for an existing database file
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();

        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            create_if_missing: false,
        }
    }

    /// Configuration for an in-memory database (useful for testing)
    ///
    /// A single connection is used so every query sees the same database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(1),
            create_if_missing: true,
        }
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Allow creating a fresh database file
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool
///
/// # Errors
///
/// Returns an error if:
/// - The database file cannot be opened
/// - Connection pool creation fails
/// - The health check fails
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Creating database connection pool"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout)
        .create_if_missing(config.create_if_missing);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            LibraryError::Database(e)
        })?;

    health_check(&pool).await?;

    Ok(pool)
}

/// Create the `games` table if it is missing.
pub async fn ensure_games_table(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(GAMES_TABLE_SQL).execute(pool).await?;
    Ok(())
}

/// In-memory pool with the `games` table in place.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    ensure_games_table(&pool).await?;
    Ok(pool)
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    debug!("Performing database health check");

    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        LibraryError::Database(e)
    })?;

    Ok(())
}
