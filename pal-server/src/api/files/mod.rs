//! Upload routes
//!
//! Stores uploads in the configured upload directory, serves them back as
//! attachments and lists recent files newest first.

pub mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/upload", post(handler::upload))
        .route("/uploads/{filename}", get(handler::download))
        .route("/api/files", get(handler::list))
}
