use axum::{Router, routing::get};

use crate::core::state::ServerState;

pub mod handler;

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/api/config",
        get(handler::get_config).post(handler::update_config),
    )
}
