use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
mod password;
mod projection;
pub mod repo;
pub mod repo_types;
pub mod services;
mod validate;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::registration_routes())
}
