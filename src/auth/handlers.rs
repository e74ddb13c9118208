use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{RotateSecretRequest, TokenRequest, TokenResponse},
        error::CredentialError,
        extractors::{AdminUser, AuthUser},
        password::dummy_digest,
    },
    state::AppState,
    users::{directory::DirectoryError, dto::UserView, services::normalize_email},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/token", post(issue_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/rotate-secret", post(rotate_secret))
}

fn invalid_credentials() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
}

#[instrument(skip(state, payload))]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let email = normalize_email(&payload.email);

    let user = match state.directory.find_by_email(&email).await {
        Ok(u) => u,
        Err(DirectoryError::NotFound) => {
            if let Some(digest) = dummy_digest() {
                let _ = state.hasher.verify(&payload.password, digest);
            }
            warn!(%email, "login unknown email");
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()));
        }
    };

    let ok = match state.hasher.verify(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = user.id, "verify_password failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()));
        }
    };
    if !ok {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let access_token = match state.credentials.issue(&user) {
        Ok(t) => t,
        Err(CredentialError::InvalidSubject) => {
            warn!(user_id = user.id, "login for blocked user");
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!(error = %e, "token issuance failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()));
        }
    };

    info!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.credentials.ttl_seconds(),
    }))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn rotate_secret(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<RotateSecretRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.credentials.rotate_secret(&payload.secret) {
        Ok(()) => {
            info!(admin_id = admin.id, "signing secret rotated by admin");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(CredentialError::EmptySecret) => {
            Err((StatusCode::BAD_REQUEST, "Secret must not be empty".into()))
        }
        Err(e) => {
            error!(error = %e, "secret rotation failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()))
        }
    }
}
