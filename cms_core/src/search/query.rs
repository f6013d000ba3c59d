use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::PaginationConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "ASC"),
            SortOrder::Desc => write!(f, "DESC"),
        }
    }
}

/// Paging and ordering requested by the caller. A missing limit falls back to
/// the configured default page size.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ListParams {
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "Offset cannot be negative"))]
    pub offset: Option<i64>,
    #[validate(length(min = 1, max = 64, message = "Sort column is invalid"))]
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

/// Paging resolved against [`PaginationConfig`], with an allow-listed order column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParams {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: &'static str,
    pub sort_order: SortOrder,
}

impl ResolvedParams {
    pub fn order_clause(&self) -> String {
        format!("ORDER BY {} {}", self.sort_by, self.sort_order)
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(column.into());
        self.sort_order = Some(order);
        self
    }

    /// Validates the request and resolves it against the sortable columns of
    /// one table. The first entry of `sortable` is the default order column.
    pub fn resolve(
        &self,
        pagination: &PaginationConfig,
        sortable: &[&'static str],
    ) -> Result<ResolvedParams> {
        self.validate()
            .map_err(|e| AppError::BadRequest(format!("Invalid list parameters: {}", e)))?;

        let sort_by = match self.sort_by.as_deref() {
            None => sortable.first().copied().unwrap_or("id"),
            Some(requested) => sortable
                .iter()
                .copied()
                .find(|column| *column == requested)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Cannot sort by '{}'", requested))
                })?,
        };

        let limit = self
            .limit
            .unwrap_or(i64::from(pagination.default_page_size))
            .min(i64::from(pagination.max_page_size));

        Ok(ResolvedParams {
            limit,
            offset: self.offset.unwrap_or(0),
            sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
        })
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_more: bool,
}

impl<T> SearchResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, params: &ResolvedParams) -> Self {
        let offset = params.offset.max(0) as u64;
        let has_more = offset + (items.len() as u64) < total_count;

        Self {
            items,
            total_count,
            offset,
            limit: params.limit.max(0) as u64,
            has_more,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
