use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_token;
use crate::core::state::ServerState;

pub mod handler;

pub fn router(state: &ServerState) -> Router<ServerState> {
    let protected = Router::new()
        .route("/api/print", post(handler::print))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ));

    Router::new()
        .route("/api/preview/{filename}", get(handler::preview))
        .merge(protected)
}
