use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::models::User;
use crate::database::{format_timestamp, parse_timestamp};
use crate::error::{AppError, Result};
use crate::search::{Criteria, ResolvedParams, SearchResult};

/// Columns a user search may be ordered by; the first is the default.
pub const USER_SORTABLE: &[&str] = &["id", "username", "email", "type", "date_entered", "date_updated"];

const USER_COLUMNS: &str = "id, username, email, pass, type, date_entered, date_updated";

#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn insert(&self, user: &User) -> Result<User>;
    async fn update(&self, user: &User) -> Result<User>;
    async fn find(&self, id: i64) -> Result<Option<User>>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn search(&self, criteria: &Criteria, params: &ResolvedParams) -> Result<SearchResult<User>>;
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        Ok(User {
            id: Some(row.try_get("id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            pass: row.try_get("pass")?,
            pass_compare: None,
            user_type: row.try_get("type")?,
            date_entered: parse_timestamp(row.try_get("date_entered")?)?,
            date_updated: parse_timestamp(row.try_get("date_updated")?)?,
        })
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn insert(&self, user: &User) -> Result<User> {
        let date_entered = user.date_entered.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            r#"
            INSERT INTO user (username, email, pass, type, date_entered, date_updated)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.pass)
        .bind(user.user_type.as_deref().unwrap_or("public"))
        .bind(format_timestamp(&date_entered))
        .bind(user.date_updated.as_ref().map(format_timestamp))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} vanished after insert", id)))
    }

    async fn update(&self, user: &User) -> Result<User> {
        let id = user
            .id
            .ok_or_else(|| AppError::BadRequest("Cannot update a user without an id".to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE user
            SET username = ?, email = ?, pass = ?, type = ?, date_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.pass)
        .bind(user.user_type.as_deref().unwrap_or("public"))
        .bind(user.date_updated.as_ref().map(format_timestamp))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn find(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM user WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM user WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        Ok(())
    }

    async fn search(&self, criteria: &Criteria, params: &ResolvedParams) -> Result<SearchResult<User>> {
        let where_clause = criteria.where_clause();

        let count_query = format!("SELECT COUNT(*) as count FROM user {}", where_clause);
        let total: i64 = criteria
            .bind_to(sqlx::query(&count_query))
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let list_query = format!(
            "SELECT {} FROM user {} {} LIMIT ? OFFSET ?",
            USER_COLUMNS,
            where_clause,
            params.order_clause()
        );
        let rows = criteria
            .bind_to(sqlx::query(&list_query))
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await?;

        let users = rows.iter().map(Self::row_to_user).collect::<Result<Vec<_>>>()?;

        Ok(SearchResult::new(users, total.max(0) as u64, params))
    }
}
