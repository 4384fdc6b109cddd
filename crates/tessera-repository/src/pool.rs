//! Database connection pool management.

use async_trait::async_trait;
use shaku::Component;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tessera_config::DatabaseConfig;
use tessera_core::{Interface, TesseraError, TesseraResult};
use tracing::{info, warn};

/// Interface for database pool operations.
///
/// This trait abstracts database pool functionality for dependency injection.
#[async_trait]
pub trait DatabasePoolInterface: Interface + Send + Sync {
    /// Returns a reference to the underlying SQLite pool.
    fn inner(&self) -> &SqlitePool;

    /// Checks if the database connection is healthy.
    async fn health_check(&self) -> TesseraResult<()>;

    /// Runs a multi-statement SQL script (schema setup, fixtures).
    async fn execute_script(&self, sql: &str) -> TesseraResult<()>;

    /// Closes the database pool.
    async fn close(&self);
}

/// Database pool wrapper.
#[derive(Component)]
#[shaku(interface = DatabasePoolInterface)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Creates a new database pool from configuration.
    ///
    /// An in-memory database lives as long as its connection, so in-memory
    /// URLs get a single connection that is never recycled.
    pub async fn new(config: &DatabaseConfig) -> TesseraResult<Self> {
        info!("Connecting to SQLite database...");

        let mut options = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()));
        if config.is_in_memory() {
            options = options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&config.url).await.map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            TesseraError::Database(format!("Failed to connect: {}", e))
        })?;

        info!(in_memory = config.is_in_memory(), "SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Creates DatabasePool with a pre-existing pool (for Shaku injection).
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new database pool from configuration.
    ///
    /// This is an alias for [`new`](Self::new).
    pub async fn connect(config: &DatabaseConfig) -> TesseraResult<Self> {
        Self::new(config).await
    }
}

#[async_trait]
impl DatabasePoolInterface for DatabasePool {
    fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    async fn health_check(&self) -> TesseraResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| TesseraError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    async fn execute_script(&self, sql: &str) -> TesseraResult<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing database connection pool...");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

impl std::ops::Deref for DatabasePool {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}

/// Creates a shared database pool.
pub async fn create_pool(config: &DatabaseConfig) -> TesseraResult<std::sync::Arc<DatabasePool>> {
    let pool = DatabasePool::new(config).await?;
    Ok(std::sync::Arc::new(pool))
}
