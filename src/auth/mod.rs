use crate::state::AppState;
use axum::Router;

mod dto;
pub(crate) mod extractors;
pub mod handlers;
mod jwt;
pub mod password;
pub mod repo;
mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
