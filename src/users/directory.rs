//! Account directory contract: the authoritative store of user records.
//!
//! The credential service only needs `find_by_id`; the rest of the
//! contract backs the account management endpoints and the install
//! command.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    #[serde(alias = "ID")]
    Id,
    Email,
    #[serde(alias = "firstName")]
    FirstName,
    #[serde(alias = "lastName")]
    LastName,
    #[serde(alias = "createdAt")]
    CreatedAt,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Email => "email",
            SortKey::FirstName => "first_name",
            SortKey::LastName => "last_name",
            SortKey::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub const MAX_PAGE_SIZE: i64 = 100;

/// Highest page whose offset still fits an `i64` at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Page-based listing window; `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_by: SortKey::Id,
            sort_order: SortOrder::Asc,
        }
    }
}

impl Pagination {
    /// Clamps page and limit into their valid ranges.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.clamp(1, MAX_PAGE),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

/// Storage-agnostic account directory.
///
/// Calls may block on I/O and may fail; callers propagate the error
/// unchanged.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_by_id(&self, id: i64) -> DirectoryResult<User>;

    async fn find_by_email(&self, email: &str) -> DirectoryResult<User>;

    /// Inserts a new record, failing with `Conflict` on a duplicate email.
    async fn create(&self, user: NewUser) -> DirectoryResult<User>;

    /// Persists every mutable field of an existing record.
    async fn save(&self, user: &User) -> DirectoryResult<()>;

    /// Idempotent block/unblock toggle.
    async fn set_active(&self, id: i64, active: bool) -> DirectoryResult<()>;

    async fn delete(&self, id: i64) -> DirectoryResult<()>;

    async fn list(&self, pagination: Pagination) -> DirectoryResult<Page<User>>;

    async fn count_with_role(&self, role: &str) -> DirectoryResult<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_normalizes_out_of_range_values() {
        let p = Pagination {
            page: 0,
            limit: 1000,
            ..Default::default()
        }
        .normalized();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            page: 3,
            limit: 10,
            ..Default::default()
        }
        .normalized();
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_offset() {
        let p = Pagination {
            page: i64::MAX,
            limit: MAX_PAGE_SIZE,
            ..Default::default()
        }
        .normalized();
        assert_eq!(p.page, MAX_PAGE);
        assert!(p.offset() >= 0);

        let raw = Pagination {
            page: i64::MAX,
            limit: i64::MAX,
            ..Default::default()
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn sort_key_accepts_camel_case_aliases() {
        let key: SortKey = serde_json::from_str("\"firstName\"").unwrap();
        assert_eq!(key, SortKey::FirstName);
        let key: SortKey = serde_json::from_str("\"created_at\"").unwrap();
        assert_eq!(key.column(), "created_at");
        assert!(serde_json::from_str::<SortKey>("\"password_hash\"").is_err());
    }
}
