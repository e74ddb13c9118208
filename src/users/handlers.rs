use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::directory::DirectoryError;
use super::dto::{
    CreateUserRequest, CreatedResponse, ListQuery, ResetResponse, StatusResponse,
    UpdateUserRequest, UserListResponse, UserView,
};
use super::services::{self, AccountError};
use crate::{auth::extractors::AdminUser, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/block", post(block_user))
        .route("/users/:id/unblock", post(unblock_user))
        .route("/users/:id/reset-password", post(reset_password))
}

fn reject(e: AccountError) -> (StatusCode, String) {
    match e {
        AccountError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        AccountError::AdminExists => (StatusCode::CONFLICT, e.to_string()),
        AccountError::Directory(DirectoryError::NotFound) => {
            (StatusCode::NOT_FOUND, "User not found".into())
        }
        AccountError::Directory(DirectoryError::Conflict) => {
            (StatusCode::CONFLICT, "Email already registered".into())
        }
        other => {
            error!(error = %other, "account operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<UserListResponse>, (StatusCode, String)> {
    let page = services::list_users(&state, q.into()).await.map_err(reject)?;
    Ok(Json(UserListResponse {
        total: page.total,
        page: page.page,
        limit: page.limit,
        users: page.items.into_iter().map(UserView::from).collect(),
    }))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, (StatusCode, String)> {
    let user = state
        .directory
        .find_by_id(id)
        .await
        .map_err(|e| reject(e.into()))?;
    if !user.is_active {
        warn!(user_id = id, "requested user is blocked");
        return Err((StatusCode::FORBIDDEN, "User not active".into()));
    }
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), (StatusCode, String)> {
    let user = services::create_user(&state, payload).await.map_err(reject)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            status: "User created",
            id: user.id,
        }),
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    services::update_user(&state, id, payload)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "User updated",
    }))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::delete_user(&state, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, _admin))]
pub async fn block_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    services::set_active(&state, id, false)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "User blocked",
    }))
}

#[instrument(skip(state, _admin))]
pub async fn unblock_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    services::set_active(&state, id, true)
        .await
        .map_err(reject)?;
    Ok(Json(StatusResponse {
        status: "User unblocked",
    }))
}

#[instrument(skip(state, _admin))]
pub async fn reset_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ResetResponse>, (StatusCode, String)> {
    let outcome = services::reset_password(&state, id)
        .await
        .map_err(reject)?;
    Ok(Json(ResetResponse {
        status: "Password reset successfully",
        notified: outcome.notified,
    }))
}
