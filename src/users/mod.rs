mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(max_upload_bytes))
}
