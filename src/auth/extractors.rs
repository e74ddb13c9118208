use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tracing::{error, warn};

use super::error::CredentialError;
use crate::state::AppState;
use crate::users::directory::DirectoryError;
use crate::users::repo_types::{User, ROLE_ADMIN};

/// Authenticated, active user behind the request's bearer token.
pub struct AuthUser(pub User);

/// Like [`AuthUser`], additionally holding the admin role.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, (StatusCode, String)> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header".into()))?;

    // Expect "Bearer <token>", scheme case-insensitive
    auth.split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".into()))
}

/// Collapses credential failures into the response the client sees.
fn reject(e: CredentialError) -> (StatusCode, String) {
    match e {
        CredentialError::Malformed
        | CredentialError::SignatureInvalid
        | CredentialError::Expired
        | CredentialError::InvalidSubject
        | CredentialError::Directory(DirectoryError::NotFound) => {
            warn!(reason = %e, "bearer authentication rejected");
            (StatusCode::UNAUTHORIZED, "Authentication failed".into())
        }
        CredentialError::Cancelled | CredentialError::DirectoryTimeout => {
            warn!(reason = %e, "bearer authentication aborted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication unavailable".into(),
            )
        }
        other => {
            error!(error = %other, "bearer authentication failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let cancel = state.shutdown.child_token();
        let user = state
            .credentials
            .authenticate(token, &cancel)
            .await
            .map_err(reject)?;
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.has_role(ROLE_ADMIN) {
            warn!(user_id = user.id, "admin role required");
            return Err((StatusCode::FORBIDDEN, "Admin role required".into()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, Request};

    use super::*;
    use crate::users::memory::{sample_user, MemoryDirectory};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/me");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn state_with(users: &[crate::users::repo_types::User]) -> AppState {
        let dir = std::sync::Arc::new(MemoryDirectory::new());
        for u in users {
            dir.insert(u.clone());
        }
        AppState::fake_with(dir, std::sync::Arc::new(crate::mail::DisabledMailer))
    }

    #[tokio::test]
    async fn accepts_valid_bearer_token() {
        let user = sample_user(5, "u@example.com", &["user"], true);
        let state = state_with(std::slice::from_ref(&user));
        let token = state.credentials.issue(&user).unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(found.id, 5);

        for scheme in ["bearer", "BEARER", "BeArEr"] {
            let mut parts = parts_with(Some(&format!("{scheme} {token}")));
            assert!(
                AuthUser::from_request_parts(&mut parts, &state).await.is_ok(),
                "{scheme} scheme rejected"
            );
        }
    }

    #[tokio::test]
    async fn rejects_missing_or_foreign_scheme() {
        let state = state_with(&[]);
        let headers = [
            None,
            Some("Basic abc"),
            Some("Bearer "),
            Some("Bearerabc"),
            Some("Token abc"),
        ];
        for header in headers {
            let mut parts = parts_with(header);
            let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
                .await
                .err()
                .expect("rejected");
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn validation_failures_collapse_to_unauthorized() {
        let user = sample_user(5, "u@example.com", &["user"], true);
        let state = state_with(std::slice::from_ref(&user));
        let token = state.credentials.issue(&user).unwrap();
        state.credentials.rotate_secret("rotated").unwrap();

        for bad in ["garbage".to_string(), token] {
            let mut parts = parts_with(Some(&format!("Bearer {bad}")));
            let (status, msg) = AuthUser::from_request_parts(&mut parts, &state)
                .await
                .err()
                .expect("rejected");
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(msg, "Authentication failed");
        }
    }

    #[tokio::test]
    async fn blocked_user_is_rejected_with_valid_token() {
        let user = sample_user(6, "b@example.com", &["user"], true);
        let state = state_with(std::slice::from_ref(&user));
        let token = state.credentials.issue(&user).unwrap();
        state.directory.set_active(6, false).await.unwrap();

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejected");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_extractor_requires_role() {
        let admin = sample_user(1, "root@example.com", &["admin"], true);
        let plain = sample_user(2, "u@example.com", &["user"], true);
        let state = state_with(&[admin.clone(), plain.clone()]);

        let token = state.credentials.issue(&plain).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let (status, _) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("forbidden");
        assert_eq!(status, StatusCode::FORBIDDEN);

        let token = state.credentials.issue(&admin).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AdminUser(found) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect("admin");
        assert_eq!(found.id, 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_authentication() {
        let user = sample_user(5, "u@example.com", &["user"], true);
        let state = state_with(std::slice::from_ref(&user));
        let token = state.credentials.issue(&user).unwrap();
        state.shutdown.cancel();

        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("aborted");
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
