use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
        .merge(handlers::admin_routes())
}
