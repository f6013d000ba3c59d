use sqlx::{Row, SqlitePool};
use tracing::{error, info};

use crate::error::{AppError, Result};

pub struct MigrationManager {
    pool: SqlitePool,
}

impl MigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Starting database migrations");

        self.create_migrations_table().await?;

        let current_version = self.get_current_version().await?;
        info!("Current migration version: {}", current_version);

        let mut applied_count = 0;

        for migration in migrations() {
            if migration.version > current_version {
                info!("Applying migration {}: {}", migration.version, migration.name);
                self.apply_migration(&migration).await?;
                applied_count += 1;
            }
        }

        if applied_count > 0 {
            info!("Applied {} migrations successfully", applied_count);
        } else {
            info!("No new migrations to apply");
        }

        Ok(())
    }

    async fn create_migrations_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                checksum TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_current_version(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) as version FROM _migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("version")?)
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for statement in migration.sql_statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to execute migration statement: {}", e);
                    AppError::from(e)
                })?;
        }

        sqlx::query("INSERT INTO _migrations (version, name, checksum) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(migration.checksum)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_migration_history(&self) -> Result<Vec<MigrationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT version, name, applied_at, checksum
            FROM _migrations
            ORDER BY version
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(MigrationRecord {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
                checksum: row.try_get("checksum")?,
            });
        }

        Ok(records)
    }
}

struct Migration {
    version: i64,
    name: &'static str,
    checksum: &'static str,
    sql_statements: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: String,
    pub checksum: String,
}

fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "create_user_table",
            checksum: "user_v1",
            sql_statements: &[
                r#"
                CREATE TABLE user (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    pass TEXT NOT NULL,
                    type TEXT NOT NULL DEFAULT 'public'
                        CHECK (type IN ('public', 'author', 'admin')),
                    date_entered TEXT NOT NULL,
                    date_updated TEXT
                )
                "#,
            ],
        },
        Migration {
            version: 2,
            name: "create_file_table",
            checksum: "file_v1",
            sql_statements: &[
                r#"
                CREATE TABLE file (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER REFERENCES user(id) ON DELETE SET NULL,
                    name TEXT NOT NULL,
                    type TEXT NOT NULL,
                    size TEXT NOT NULL,
                    description TEXT,
                    date_entered TEXT NOT NULL,
                    date_updated TEXT
                )
                "#,
                "CREATE INDEX idx_file_user_id ON file(user_id)",
                "CREATE INDEX idx_file_name ON file(name)",
            ],
        },
        Migration {
            version: 3,
            name: "create_page_tables",
            checksum: "page_v1",
            sql_statements: &[
                r#"
                CREATE TABLE page (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER REFERENCES user(id) ON DELETE SET NULL
                )
                "#,
                r#"
                CREATE TABLE page_has_file (
                    page_id INTEGER NOT NULL REFERENCES page(id) ON DELETE CASCADE,
                    file_id INTEGER NOT NULL REFERENCES file(id) ON DELETE CASCADE,
                    PRIMARY KEY (page_id, file_id)
                )
                "#,
                "CREATE INDEX idx_page_has_file_file_id ON page_has_file(file_id)",
            ],
        },
        Migration {
            version: 4,
            name: "user_identity_nocase",
            checksum: "user_nocase_v1",
            sql_statements: &[
                "CREATE UNIQUE INDEX idx_user_username_nocase ON user(username COLLATE NOCASE)",
                "CREATE UNIQUE INDEX idx_user_email_nocase ON user(email COLLATE NOCASE)",
            ],
        },
    ]
}

pub async fn run_migrations(pool: SqlitePool) -> Result<()> {
    let migration_manager = MigrationManager::new(pool);
    migration_manager.run_migrations().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::connection::get_database_pool;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_migrations() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = DatabaseConfig::with_url(format!("sqlite:{}", temp_file.path().display()));

        let pool = get_database_pool(&config).await.unwrap();
        let migration_manager = MigrationManager::new(pool.clone());

        migration_manager.run_migrations().await.unwrap();

        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM sqlite_master WHERE type='table' AND name IN ('user', 'file', 'page', 'page_has_file')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        let table_count: i64 = row.try_get("count").unwrap();
        assert_eq!(table_count, 4);

        let history = migration_manager.get_migration_history().await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].name, "create_user_table");
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = DatabaseConfig::with_url(format!("sqlite:{}", temp_file.path().display()));
        let pool = get_database_pool(&config).await.unwrap();

        run_migrations(pool.clone()).await.unwrap();
        run_migrations(pool.clone()).await.unwrap();

        let history = MigrationManager::new(pool).get_migration_history().await.unwrap();
        assert_eq!(history.len(), 4);
    }
}
