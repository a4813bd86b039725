//! Preview and print handlers
//!
//! Preview renders one page of a stored upload as a PNG. Print runs the
//! full pipeline: prepare a print-ready file (or pass the original
//! through in raw mode), hand it to the spooler, then delete the derived
//! temp file whether submission succeeded or not.

use std::str::FromStr;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use pal_printer::{PalError, RenderMode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::api::files::handler::reject_traversal;
use crate::core::error::{AppError, Result};
use crate::core::state::ServerState;

const LP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub mode: Option<String>,
    pub page: Option<u32>,
    pub w: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PrintRequest {
    pub filename: String,
    pub mode: Option<String>,
    pub printer: Option<String>,
    pub copies: Option<u32>,
}

fn parse_mode(raw: Option<&str>, fallback: RenderMode) -> Result<RenderMode> {
    match raw {
        Some(s) if !s.trim().is_empty() => {
            RenderMode::from_str(s).map_err(|e| AppError::Validation(e.to_string()))
        }
        _ => Ok(fallback),
    }
}

pub async fn preview(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Response> {
    reject_traversal(&filename)?;
    let config = state.config();
    let mode = parse_mode(query.mode.as_deref(), config.printing.default_mode)?;
    let page = query.page.unwrap_or(1);
    let width = query.w.unwrap_or(720);

    let path = state.upload_dir().join(&filename);
    if !path.is_file() {
        return Err(AppError::NotFound(format!("No such upload: {filename}")));
    }

    let png = pal_printer::render_preview_png(
        &path,
        mode,
        page,
        width,
        config.printing.preview_dpi as u32,
        config.printing.bw_threshold as u8,
    )
    .await
    .map_err(|e| AppError::PreviewFailed(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

pub async fn print(
    State(state): State<ServerState>,
    Json(req): Json<PrintRequest>,
) -> Result<Json<Value>> {
    reject_traversal(&req.filename)?;
    let config = state.config();
    let mode = parse_mode(req.mode.as_deref(), config.printing.default_mode)?;
    let copies = req.copies.unwrap_or(config.printing.default_copies as u32);
    let printer = req
        .printer
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            let configured = config.printing.default_printer.trim();
            (!configured.is_empty()).then(|| configured.to_string())
        });

    let path = state.upload_dir().join(&req.filename);
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "No such upload: {}",
            req.filename
        )));
    }

    let prepared = pal_printer::prepare_print_file(
        &path,
        mode,
        config.printing.print_dpi as u32,
        config.printing.max_pdf_pages_process as u32,
        config.printing.bw_threshold as u8,
    )
    .await
    .map_err(map_print_error)?;

    let title = format!("PrinterPal: {}", req.filename);
    let outcome = pal_printer::print_file(
        &prepared.path,
        printer.as_deref(),
        copies,
        &title,
        &[],
        LP_TIMEOUT,
    )
    .await;

    // The derived temp file is ours to clean up in every outcome.
    if prepared.prepared {
        if let Err(e) = std::fs::remove_file(&prepared.path) {
            warn!(path = %prepared.path.display(), "failed to remove print temp file: {e}");
        }
    }

    let res = outcome.map_err(map_print_error)?;
    info!(
        filename = %req.filename,
        mode = %mode,
        copies,
        printer = printer.as_deref().unwrap_or("(default)"),
        "print job submitted"
    );
    Ok(Json(json!({"ok": true, "lp_stdout": res.stdout.trim()})))
}

fn map_print_error(e: PalError) -> AppError {
    match e {
        PalError::Validation(msg) => AppError::Validation(msg),
        other => AppError::OperationFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_fallback() {
        assert_eq!(
            parse_mode(None, RenderMode::Grayscale).unwrap(),
            RenderMode::Grayscale
        );
        assert_eq!(
            parse_mode(Some(""), RenderMode::Bw).unwrap(),
            RenderMode::Bw
        );
        assert_eq!(
            parse_mode(Some("dither"), RenderMode::Raw).unwrap(),
            RenderMode::Dither
        );
    }

    #[test]
    fn test_parse_mode_rejects_unknown() {
        let err = parse_mode(Some("sepia"), RenderMode::Raw).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
