use serde::{Deserialize, Serialize};

use super::directory::{Pagination, SortKey, SortOrder};
use super::repo_types::User;

/// Request body for account creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for profile updates.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Query string of `GET /users`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_order: SortOrder,
}
fn default_page() -> i64 { 1 }
fn default_limit() -> i64 { 10 }

impl From<ListQuery> for Pagination {
    fn from(q: ListQuery) -> Self {
        Pagination {
            page: q.page,
            limit: q.limit,
            sort_by: q.sort_by,
            sort_order: q.sort_order,
        }
    }
}

/// Public part of a user returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub roles: Vec<String>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            is_active: u.is_active,
            roles: u.roles,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub status: &'static str,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub notified: bool,
}
