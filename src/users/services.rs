use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use super::directory::{DirectoryError, Page, Pagination};
use super::dto::{CreateUserRequest, UpdateUserRequest};
use super::repo_types::{NewUser, User, ROLE_ADMIN, ROLE_USER};
use crate::auth::password::generate_password;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;
const RESET_SUBJECT: &str = "Password Reset";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("an administrator already exists")]
    AdminExists,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn checked_email(raw: &str) -> Result<String, AccountError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AccountError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn checked_name(raw: &str, field: &str) -> Result<String, AccountError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AccountError::Validation(format!("{field} must not be blank")));
    }
    Ok(name.to_string())
}

fn checked_password(raw: &str) -> Result<(), AccountError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::Validation("Password too short".into()));
    }
    Ok(())
}

pub async fn create_user(st: &AppState, req: CreateUserRequest) -> Result<User, AccountError> {
    let email = checked_email(&req.email)?;
    let first_name = checked_name(&req.first_name, "firstName")?;
    let last_name = checked_name(&req.last_name, "lastName")?;
    checked_password(&req.password)?;

    let password_hash = st.hasher.hash(&req.password)?;
    let user = st
        .directory
        .create(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            roles: vec![ROLE_USER.to_string()],
            is_active: true,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok(user)
}

/// Changes email and names; roles, password and active flag are untouched.
pub async fn update_user(
    st: &AppState,
    id: i64,
    req: UpdateUserRequest,
) -> Result<User, AccountError> {
    let email = checked_email(&req.email)?;
    let first_name = checked_name(&req.first_name, "firstName")?;
    let last_name = checked_name(&req.last_name, "lastName")?;

    let mut user = st.directory.find_by_id(id).await?;
    user.email = email;
    user.first_name = first_name;
    user.last_name = last_name;
    st.directory.save(&user).await?;

    info!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn set_active(st: &AppState, id: i64, active: bool) -> Result<(), AccountError> {
    st.directory.set_active(id, active).await?;
    info!(user_id = id, active, "user active flag changed");
    Ok(())
}

pub async fn delete_user(st: &AppState, id: i64) -> Result<(), AccountError> {
    st.directory.delete(id).await?;
    info!(user_id = id, "user deleted");
    Ok(())
}

pub async fn list_users(st: &AppState, pagination: Pagination) -> Result<Page<User>, AccountError> {
    Ok(st.directory.list(pagination).await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub notified: bool,
}

/// Generates a new password, commits its digest, then mails the plaintext.
///
/// A delivery failure leaves the new digest in place and is reported
/// through `notified`. Outstanding tokens stay valid until they expire.
pub async fn reset_password(st: &AppState, id: i64) -> Result<ResetOutcome, AccountError> {
    let mut user = st.directory.find_by_id(id).await?;

    let plain = generate_password();
    user.password_hash = st.hasher.hash(&plain)?;
    st.directory.save(&user).await?;
    info!(user_id = user.id, "password reset committed");

    let body = format!("Your new password is: {plain}");
    let notified = match st.mailer.send(&user.email, RESET_SUBJECT, &body).await {
        Ok(()) => true,
        Err(e) => {
            warn!(user_id = user.id, error = %e, "password reset mail not delivered");
            false
        }
    };
    Ok(ResetOutcome { notified })
}

/// Bootstraps the first administrator account.
pub async fn install_admin(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    if st.directory.count_with_role(ROLE_ADMIN).await? > 0 {
        return Err(AccountError::AdminExists);
    }
    let email = checked_email(email)?;
    checked_password(password)?;

    let password_hash = st.hasher.hash(password)?;
    let admin = st
        .directory
        .create(NewUser {
            email,
            password_hash,
            first_name: "Admin".into(),
            last_name: "User".into(),
            roles: vec![ROLE_ADMIN.to_string()],
            is_active: true,
        })
        .await?;

    info!(user_id = admin.id, email = %admin.email, "admin user created");
    Ok(admin)
}
