//! Core library for the CMS data layer: user and file records, their
//! validation rules, filter-template search and SQLite persistence.

pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod search;
pub mod users;
pub mod validation;

pub use config::{AppConfig, DatabaseConfig, PaginationConfig};
pub use database::{get_database_pool, run_migrations, DatabaseManager, MigrationManager};
pub use error::{AppError, Result};
pub use files::{File, FileRepository, FileService, PageRepository};
pub use search::{Criteria, ListParams, SearchResult, SortOrder};
pub use users::{User, UserRepository, UserService, UserType};
pub use validation::{validate, FieldErrors, Scenario, Validatable, ValidationContext};

/// Services sharing one connection pool.
#[derive(Clone)]
pub struct AppState {
    pub db_manager: DatabaseManager,
    pub user_service: UserService,
    pub file_service: FileService,
}

impl AppState {
    pub fn new(db_manager: DatabaseManager, config: &AppConfig) -> Self {
        Self {
            user_service: UserService::new(db_manager.clone(), config.pagination.clone()),
            file_service: FileService::new(db_manager.clone(), config.pagination.clone()),
            db_manager,
        }
    }

    /// Connects to the configured database, migrating it first when
    /// `migrate_on_start` is set.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = get_database_pool(&config.database).await?;

        if config.database.migrate_on_start {
            run_migrations(pool.clone()).await?;
        }

        Ok(Self::new(DatabaseManager::new(pool), config))
    }
}
