use approval_core::CoreError;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};

use crate::migrations::generate_migrations;
use crate::{store_error, PostgresConfig};

/// Database connection manager for Postgres
#[derive(Clone)]
pub struct PostgresConnection {
    pub(crate) pool: PgPool,
}

impl PostgresConnection {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &PostgresConfig) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.connection_string)
            .await
            .map_err(|e| store_error("Failed to connect to database", e))?;

        debug!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply every migration not yet recorded in `_approval_migrations`
    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        info!("Running database migrations");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _approval_migrations (
                version TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to create migration table", e))?;

        let applied: Vec<String> = sqlx::query("SELECT version FROM _approval_migrations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to read applied migrations", e))?
            .iter()
            .map(|row| row.try_get::<String, _>("version"))
            .collect::<Result<_, _>>()
            .map_err(|e| store_error("Failed to decode applied migrations", e))?;

        for (version, sql) in generate_migrations() {
            if applied.iter().any(|v| v == version) {
                continue;
            }

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| store_error("Failed to start migration", e))?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error(&format!("Migration {} failed", version), e))?;
            sqlx::query("INSERT INTO _approval_migrations (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await
                .map_err(|e| store_error("Failed to record migration", e))?;
            tx.commit()
                .await
                .map_err(|e| store_error("Failed to commit migration", e))?;

            debug!(version, "Applied migration");
        }

        info!("Migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
