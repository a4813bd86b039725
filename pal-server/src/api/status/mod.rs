//! Status routes
//!
//! Full status snapshot of the print subsystem, per-printer detail, and
//! the `/events` server-push stream (one snapshot every 2 seconds).

pub mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/status", get(handler::status))
        .route("/api/printer/{name}", get(handler::printer_detail))
        .route("/events", get(handler::events))
}
