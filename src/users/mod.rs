pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
#[cfg(test)]
pub mod testing;

use crate::state::AppState;
use axum::Router;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::me_routes(state))
        .merge(handlers::avatar_routes())
}
