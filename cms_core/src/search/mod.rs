//! Filter-template search: conditions, paging and result pages

pub mod filters;
pub mod query;

pub use filters::{contains_pattern, split_operator, Criteria, SqlValue};
pub use query::{ListParams, ResolvedParams, SearchResult, SortOrder};
