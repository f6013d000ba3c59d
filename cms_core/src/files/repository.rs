use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::models::File;
use crate::database::{format_timestamp, parse_timestamp};
use crate::error::{AppError, Result};
use crate::search::{Criteria, ResolvedParams, SearchResult};

pub const FILE_SORTABLE: &[&str] = &["id", "name", "type", "size", "user_id", "date_entered", "date_updated"];

const FILE_COLUMNS: &str = "id, user_id, name, type, size, description, date_entered, date_updated";

#[async_trait]
pub trait FileRepositoryTrait: Send + Sync {
    async fn insert(&self, file: &File) -> Result<File>;
    async fn update(&self, file: &File) -> Result<File>;
    async fn find(&self, id: i64) -> Result<Option<File>>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn search(&self, criteria: &Criteria, params: &ResolvedParams) -> Result<SearchResult<File>>;
    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<File>>;
    async fn attach_to_page(&self, file_id: i64, page_id: i64) -> Result<bool>;
    async fn detach_from_page(&self, file_id: i64, page_id: i64) -> Result<bool>;
    async fn page_ids(&self, file_id: i64) -> Result<Vec<i64>>;
}

#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_file(row: &SqliteRow) -> Result<File> {
        Ok(File {
            id: Some(row.try_get("id")?),
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            file_type: row.try_get("type")?,
            size: row.try_get("size")?,
            description: row.try_get("description")?,
            date_entered: parse_timestamp(row.try_get("date_entered")?)?,
            date_updated: parse_timestamp(row.try_get("date_updated")?)?,
        })
    }
}

#[async_trait]
impl FileRepositoryTrait for FileRepository {
    async fn insert(&self, file: &File) -> Result<File> {
        let date_entered = file.date_entered.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            r#"
            INSERT INTO file (user_id, name, type, size, description, date_entered, date_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file.user_id)
        .bind(&file.name)
        .bind(&file.file_type)
        .bind(&file.size)
        .bind(&file.description)
        .bind(format_timestamp(&date_entered))
        .bind(file.date_updated.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} vanished after insert", id)))
    }

    async fn update(&self, file: &File) -> Result<File> {
        let id = file
            .id
            .ok_or_else(|| AppError::BadRequest("Cannot update a file without an id".to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE file
            SET user_id = ?, name = ?, type = ?, size = ?, description = ?, date_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(file.user_id)
        .bind(&file.name)
        .bind(&file.file_type)
        .bind(&file.size)
        .bind(&file.description)
        .bind(file.date_updated.as_ref().map(format_timestamp))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File with id {} not found", id)));
        }

        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File with id {} not found", id)))
    }

    async fn find(&self, id: i64) -> Result<Option<File>> {
        let query = format!("SELECT {} FROM file WHERE id = ?", FILE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_file).transpose()
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM file WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File with id {} not found", id)));
        }

        Ok(())
    }

    async fn search(&self, criteria: &Criteria, params: &ResolvedParams) -> Result<SearchResult<File>> {
        let where_clause = criteria.where_clause();

        let count_query = format!("SELECT COUNT(*) as count FROM file {}", where_clause);
        let total: i64 = criteria
            .bind_to(sqlx::query(&count_query))
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let list_query = format!(
            "SELECT {} FROM file {} {} LIMIT ? OFFSET ?",
            FILE_COLUMNS,
            where_clause,
            params.order_clause()
        );
        let rows = criteria
            .bind_to(sqlx::query(&list_query))
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;

        let files = rows.iter().map(Self::row_to_file).collect::<Result<Vec<_>>>()?;

        Ok(SearchResult::new(files, total.max(0) as u64, params))
    }

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<File>> {
        let query = format!("SELECT {} FROM file WHERE user_id = ? ORDER BY id", FILE_COLUMNS);
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_file).collect()
    }

    async fn attach_to_page(&self, file_id: i64, page_id: i64) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO page_has_file (page_id, file_id) VALUES (?, ?)")
            .bind(page_id)
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn detach_from_page(&self, file_id: i64, page_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM page_has_file WHERE page_id = ? AND file_id = ?")
            .bind(page_id)
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn page_ids(&self, file_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT page_id FROM page_has_file WHERE file_id = ? ORDER BY page_id")
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("page_id").map_err(AppError::from))
            .collect()
    }
}

/// Pages are only tracked as attachment points for files.
#[derive(Clone)]
pub struct PageRepository {
    pool: SqlitePool,
}

impl PageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user_id: Option<i64>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO page (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM page WHERE id = ?) AS found")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        let found: i64 = row.try_get("found")?;
        Ok(found != 0)
    }
}
