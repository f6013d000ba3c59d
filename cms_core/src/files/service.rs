use std::sync::Arc;
use tracing::{debug, info};

use super::models::File;
use super::repository::{FileRepository, FileRepositoryTrait, PageRepository, FILE_SORTABLE};
use crate::config::PaginationConfig;
use crate::database::DatabaseManager;
use crate::error::{AppError, Result};
use crate::search::{ListParams, SearchResult};
use crate::users::{User, UserRepository, UserRepositoryTrait};
use crate::validation::{validate, Scenario, ValidationContext};

#[derive(Clone)]
pub struct FileService {
    file_repository: Arc<dyn FileRepositoryTrait>,
    user_repository: Arc<dyn UserRepositoryTrait>,
    page_repository: PageRepository,
    db: DatabaseManager,
    pagination: PaginationConfig,
}

impl FileService {
    pub fn new(db: DatabaseManager, pagination: PaginationConfig) -> Self {
        Self {
            file_repository: Arc::new(FileRepository::new(db.pool().clone())),
            user_repository: Arc::new(UserRepository::new(db.pool().clone())),
            page_repository: PageRepository::new(db.pool().clone()),
            db,
            pagination,
        }
    }

    /// Runs the file rules on behalf of `actor`, who becomes the owner of a
    /// file that has none.
    pub async fn validate(&self, file: &mut File, scenario: Scenario, actor: Option<i64>) -> Result<()> {
        let ctx = ValidationContext::new(scenario).with_actor(actor);
        validate(file, &ctx, &self.db).await
    }

    pub async fn create(&self, mut file: File, actor: Option<i64>) -> Result<File> {
        if file.id.is_some() {
            return Err(AppError::BadRequest("New files cannot carry an id".to_string()));
        }

        self.validate(&mut file, Scenario::Insert, actor).await?;

        let stored = self.file_repository.insert(&file).await?;
        info!("Created file {:?} owned by {:?}", stored.id, stored.user_id);
        Ok(stored)
    }

    pub async fn update(&self, mut file: File, actor: Option<i64>) -> Result<File> {
        let id = file
            .id
            .ok_or_else(|| AppError::BadRequest("Cannot update a file without an id".to_string()))?;

        let stored = self
            .file_repository
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File with id {} not found", id)))?;
        file.fill_unset_from(stored);

        self.validate(&mut file, Scenario::Update, actor).await?;

        let stored = self.file_repository.update(&file).await?;
        debug!("Updated file {}", id);
        Ok(stored)
    }

    pub async fn find(&self, id: i64) -> Result<File> {
        self.file_repository
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File with id {} not found", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.file_repository.delete(id).await?;
        info!("Deleted file {}", id);
        Ok(())
    }

    pub async fn search(&self, filter: &File, params: &ListParams) -> Result<SearchResult<File>> {
        let resolved = params.resolve(&self.pagination, FILE_SORTABLE)?;
        self.file_repository
            .search(&filter.search_criteria(), &resolved)
            .await
    }

    /// The uploader, or `None` for files without an owner.
    pub async fn owner(&self, file_id: i64) -> Result<Option<User>> {
        match self.find(file_id).await?.user_id {
            Some(user_id) => self.user_repository.find(user_id).await,
            None => Ok(None),
        }
    }

    /// Returns `false` when the file was already on the page.
    pub async fn attach_to_page(&self, file_id: i64, page_id: i64) -> Result<bool> {
        self.find(file_id).await?;
        if !self.page_repository.exists(page_id).await? {
            return Err(AppError::NotFound(format!("Page with id {} not found", page_id)));
        }

        self.file_repository.attach_to_page(file_id, page_id).await
    }

    pub async fn detach_from_page(&self, file_id: i64, page_id: i64) -> Result<bool> {
        self.file_repository.detach_from_page(file_id, page_id).await
    }

    pub async fn page_ids(&self, file_id: i64) -> Result<Vec<i64>> {
        self.find(file_id).await?;
        self.file_repository.page_ids(file_id).await
    }
}
