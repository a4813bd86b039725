//! Configuration endpoints
//!
//! GET returns the active configuration. POST validates the submitted
//! document, persists it atomically, then swaps the in-memory snapshot so
//! later requests see the new values. The auth check runs inside the
//! handler because GET on the same path stays public.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, Uri},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::auth::{TOKEN_HEADER, check_token};
use crate::core::error::{AppError, Result};
use crate::core::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct ConfigPayload {
    pub config: Value,
}

pub async fn get_config(State(state): State<ServerState>) -> Json<Value> {
    let config = state.config();
    Json(json!({"config": *config}))
}

pub async fn update_config(
    State(state): State<ServerState>,
    headers: HeaderMap,
    uri: Uri,
    Json(payload): Json<ConfigPayload>,
) -> Result<Json<Value>> {
    let current = state.config();
    let header = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    check_token(
        current.security.require_token,
        &current.security.token,
        header,
        uri.query(),
    )?;

    if !payload.config.is_object() {
        return Err(AppError::Validation("config must be a JSON object".into()));
    }

    let config = state.store().save(&payload.config).map_err(|e| match e {
        pal_printer::PalError::Config(msg) => AppError::Config(msg),
        other => AppError::OperationFailed(other.to_string()),
    })?;
    let auto_enable = config.airprint.auto_enable;
    state.swap_config(config);
    tracing::info!("configuration updated");

    // A config update explicitly asked for AirPrint to apply, so a failed
    // re-advertise is a hard error here (unlike the background worker).
    if auto_enable {
        pal_printer::ensure_airprint(Duration::from_secs(30))
            .await
            .map_err(|e| {
                AppError::OperationFailed(format!("Config saved but AirPrint apply failed: {e}"))
            })?;
    }

    let config = state.config();
    Ok(Json(json!({"ok": true, "config": *config})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload: ConfigPayload =
            serde_json::from_value(json!({"config": {"app": {"port": 8080}}})).unwrap();
        assert!(payload.config.is_object());
    }
}
