use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod roles;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
