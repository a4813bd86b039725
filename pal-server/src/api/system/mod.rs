use axum::{Router, middleware, routing::post};

use crate::auth::require_token;
use crate::core::state::ServerState;

pub mod handler;

pub fn router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        .route("/api/airprint/ensure", post(handler::airprint_ensure))
        .route("/api/restart-host", post(handler::restart_host))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ))
}
