use std::sync::Arc;
use tracing::{debug, info};

use super::models::User;
use super::repository::{UserRepository, UserRepositoryTrait, USER_SORTABLE};
use crate::config::PaginationConfig;
use crate::database::DatabaseManager;
use crate::error::{AppError, Result};
use crate::files::{File, FileRepository, FileRepositoryTrait};
use crate::search::{ListParams, SearchResult};
use crate::validation::{validate, Scenario, ValidationContext};

#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepositoryTrait>,
    file_repository: Arc<dyn FileRepositoryTrait>,
    db: DatabaseManager,
    pagination: PaginationConfig,
}

impl UserService {
    pub fn new(db: DatabaseManager, pagination: PaginationConfig) -> Self {
        Self {
            user_repository: Arc::new(UserRepository::new(db.pool().clone())),
            file_repository: Arc::new(FileRepository::new(db.pool().clone())),
            db,
            pagination,
        }
    }

    /// Runs the user rules for `scenario`, applying defaults and timestamps
    /// to `user` in place.
    pub async fn validate(&self, user: &mut User, scenario: Scenario) -> Result<()> {
        validate(user, &ValidationContext::new(scenario), &self.db).await
    }

    pub async fn create(&self, user: User) -> Result<User> {
        self.insert(user, Scenario::Insert).await
    }

    /// Like [`create`](Self::create), but `pass` must be repeated in `pass_compare`.
    pub async fn register(&self, user: User) -> Result<User> {
        self.insert(user, Scenario::Register).await
    }

    async fn insert(&self, mut user: User, scenario: Scenario) -> Result<User> {
        if user.id.is_some() {
            return Err(AppError::BadRequest("New users cannot carry an id".to_string()));
        }

        self.validate(&mut user, scenario).await?;

        let stored = self.user_repository.insert(&user).await?;
        info!("Created user {:?} ({})", stored.id, scenario);
        Ok(stored)
    }

    pub async fn update(&self, mut user: User) -> Result<User> {
        let id = user
            .id
            .ok_or_else(|| AppError::BadRequest("Cannot update a user without an id".to_string()))?;

        let stored = self
            .user_repository
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        user.fill_unset_from(stored);

        self.validate(&mut user, Scenario::Update).await?;

        let stored = self.user_repository.update(&user).await?;
        debug!("Updated user {}", id);
        Ok(stored)
    }

    pub async fn find(&self, id: i64) -> Result<User> {
        self.user_repository
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.user_repository.delete(id).await?;
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Users matching every column set on `filter`.
    pub async fn search(&self, filter: &User, params: &ListParams) -> Result<SearchResult<User>> {
        let resolved = params.resolve(&self.pagination, USER_SORTABLE)?;
        self.user_repository
            .search(&filter.search_criteria(), &resolved)
            .await
    }

    /// Files uploaded by the user.
    pub async fn files(&self, user_id: i64) -> Result<Vec<File>> {
        self.find(user_id).await?;
        self.file_repository.list_by_owner(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::{get_database_pool, run_migrations};
    use crate::validation::ErrorKind;
    use tempfile::NamedTempFile;

    async fn setup() -> (UserService, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let config = DatabaseConfig::with_url(format!("sqlite:{}", temp_file.path().display()));
        let pool = get_database_pool(&config).await.unwrap();
        run_migrations(pool.clone()).await.unwrap();
        (
            UserService::new(DatabaseManager::new(pool), PaginationConfig::default()),
            temp_file,
        )
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let (service, _guard) = setup().await;

        let user = service
            .create(User::new("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(user.user_type.as_deref(), Some("public"));
        assert!(user.date_entered.is_some());
        assert!(user.date_updated.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_user() {
        let (service, _guard) = setup().await;

        let err = service
            .create(User::new("alice", "not-an-email", "abc"))
            .await
            .unwrap_err();
        let errors = err.field_errors().unwrap();

        assert_eq!(errors.kinds("email"), vec![ErrorKind::InvalidFormat]);
        assert_eq!(errors.kinds("pass"), vec![ErrorKind::InvalidFormat]);
        assert!(service
            .search(&User::default(), &ListParams::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_register_requires_matching_confirmation() {
        let (service, _guard) = setup().await;

        let err = service
            .register(User::new("bob", "bob@example.com", "secret1").with_pass_compare("secret2"))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().unwrap().kinds("pass"), vec![ErrorKind::Mismatch]);

        let err = service
            .register(User::new("bob", "bob@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().has_kind("pass", ErrorKind::Mismatch));

        service
            .register(User::new("bob", "bob@example.com", "secret1").with_pass_compare("secret1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_errors() {
        let (service, _guard) = setup().await;

        let err = service
            .update(User::new("x", "x@example.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let ghost = User {
            id: Some(77),
            ..User::new("x", "x@example.com", "secret1")
        };
        assert!(matches!(service.update(ghost).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_stamps_date_updated() {
        let (service, _guard) = setup().await;

        let mut user = service
            .create(User::new("carol", "carol@example.com", "secret1"))
            .await
            .unwrap();
        let entered = user.date_entered;

        user.username = Some("caroline".to_string());
        let updated = service.update(user).await.unwrap();

        assert_eq!(updated.username.as_deref(), Some("caroline"));
        assert_eq!(updated.date_entered, entered);
        assert!(updated.date_updated.is_some());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_stored_columns() {
        let (service, _guard) = setup().await;

        let alice = service
            .create(User::new("alice", "alice@example.com", "secret1"))
            .await
            .unwrap();

        let change = User {
            id: alice.id,
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        let updated = service.update(change).await.unwrap();

        assert_eq!(updated.email.as_deref(), Some("new@example.com"));
        assert_eq!(updated.username, alice.username);
        assert_eq!(updated.pass, alice.pass);
        assert_eq!(updated.user_type, alice.user_type);
        assert_eq!(updated.date_entered, alice.date_entered);
        assert!(updated.date_updated.is_some());
    }

    #[tokio::test]
    async fn test_find_and_delete() {
        let (service, _guard) = setup().await;

        let user = service
            .create(User::new("dave", "dave@example.com", "secret1"))
            .await
            .unwrap();
        let id = user.id.unwrap();

        assert_eq!(service.find(id).await.unwrap(), user);
        service.delete(id).await.unwrap();
        assert!(matches!(service.find(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.files(id).await, Err(AppError::NotFound(_))));
    }
}
