//! Privileged operations
//!
//! Both endpoints delegate to the root helper via a no-prompt sudo call.
//! They are explicit requests, so unlike the background worker a failure
//! here is surfaced to the caller.

use std::time::Duration;

use axum::Json;
use serde_json::{Value, json};
use tracing::info;

use crate::core::error::{AppError, Result};

pub async fn airprint_ensure() -> Result<Json<Value>> {
    let output = pal_printer::ensure_airprint(Duration::from_secs(45))
        .await
        .map_err(|e| AppError::OperationFailed(e.to_string()))?;
    info!("airprint re-advertisement forced");
    Ok(Json(json!({"ok": true, "output": output})))
}

pub async fn restart_host() -> Result<Json<Value>> {
    let output = pal_printer::restart_host()
        .await
        .map_err(|e| AppError::OperationFailed(e.to_string()))?;
    info!("host restart requested");
    Ok(Json(json!({"ok": true, "output": output})))
}
