use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::validation::UniqueLookup;

#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 as test")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database health check failed: {}", e);
                AppError::from(e)
            })?;

        let test_value: i32 = row.try_get("test")?;

        if test_value == 1 {
            Ok(())
        } else {
            Err(AppError::from(sqlx::Error::RowNotFound))
        }
    }
}

#[async_trait]
impl UniqueLookup for DatabaseManager {
    async fn value_taken(
        &self,
        table: &str,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        if !is_identifier(table) || !is_identifier(column) {
            return Err(AppError::BadRequest(format!(
                "Invalid uniqueness target {}.{}",
                table, column
            )));
        }

        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ? COLLATE NOCASE AND (? IS NULL OR id <> ?)) AS taken",
            table, column
        );

        let row = sqlx::query(&query)
            .bind(value)
            .bind(exclude_id)
            .bind(exclude_id)
            .fetch_one(&self.pool)
            .await?;

        let taken: i64 = row.try_get("taken")?;
        Ok(taken != 0)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

pub async fn get_database_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!("Connecting to database: {}", config.url);

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30))
        .with_regexp();

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .map_err(|e| {
            error!("Failed to create database pool: {}", e);
            AppError::from(e)
        })?;

    info!("Database connection pool created successfully");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::run_migrations;
    use tempfile::NamedTempFile;

    async fn setup() -> (DatabaseManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let config = DatabaseConfig::with_url(format!("sqlite:{}", temp_file.path().display()));

        let pool = get_database_pool(&config).await.unwrap();
        run_migrations(pool.clone()).await.unwrap();
        (DatabaseManager::new(pool), temp_file)
    }

    #[tokio::test]
    async fn test_database_connection() {
        let (db_manager, _guard) = setup().await;
        db_manager.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_value_taken_excludes_own_row() {
        let (db_manager, _guard) = setup().await;

        sqlx::query("INSERT INTO user (username, email, pass, type, date_entered) VALUES (?, ?, ?, ?, ?)")
            .bind("alice")
            .bind("alice@example.com")
            .bind("secret1")
            .bind("public")
            .bind("2024-01-01T00:00:00+00:00")
            .execute(db_manager.pool())
            .await
            .unwrap();

        assert!(db_manager.value_taken("user", "email", "alice@example.com", None).await.unwrap());
        assert!(db_manager.value_taken("user", "email", "alice@example.com", Some(2)).await.unwrap());
        assert!(!db_manager.value_taken("user", "email", "alice@example.com", Some(1)).await.unwrap());
        assert!(!db_manager.value_taken("user", "username", "bob", None).await.unwrap());
        assert!(db_manager.value_taken("user", "email", "Alice@Example.COM", None).await.unwrap());
        assert!(db_manager.value_taken("user", "username", "ALICE", Some(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_value_taken_rejects_unknown_identifiers() {
        let (db_manager, _guard) = setup().await;
        let result = db_manager.value_taken("user; DROP TABLE user", "email", "x", None).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
