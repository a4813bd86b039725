//! Status handlers
//!
//! The snapshot is a pure query: it never mutates anything. AirPrint
//! re-advertisement runs in the background worker instead (see
//! `core::tasks`), so a status poll has no side effects.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use pal_printer::{Job, JobStats, PrinterInfo, SchedulerStatus};
use serde::Serialize;
use serde_json::json;

use crate::api::files::handler::list_uploads;
use crate::core::state::ServerState;

#[derive(Debug, Serialize)]
pub struct AirprintState {
    pub enabled: bool,
}

/// Full status snapshot, rebuilt on every query.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub cups_available: bool,
    pub scheduler: SchedulerStatus,
    pub default_printer: String,
    pub default_printer_display: String,
    pub default_printer_label: String,
    pub printers: Vec<PrinterInfo>,
    pub jobs: Vec<Job>,
    pub stats: JobStats,
    pub airprint: AirprintState,
}

pub async fn compute_status(state: &ServerState) -> StatusResponse {
    let available = pal_printer::cups_available().await;
    let printers = if available {
        pal_printer::list_printers().await
    } else {
        Vec::new()
    };
    let default = pal_printer::default_printer().await;
    let default_display = pal_printer::default_printer_display().await;
    let default_label = if default_display.is_empty() {
        String::new()
    } else {
        format!("{default_display} (default)")
    };
    let (jobs, stats) = if available {
        (
            pal_printer::queue_jobs().await,
            pal_printer::job_stats().await,
        )
    } else {
        (Vec::new(), JobStats::default())
    };

    StatusResponse {
        cups_available: available,
        scheduler: pal_printer::scheduler_status().await,
        default_printer: default,
        default_printer_display: default_display,
        default_printer_label: default_label,
        printers,
        jobs,
        stats,
        airprint: AirprintState {
            enabled: state.config().airprint.auto_enable,
        },
    }
}

pub async fn status(State(state): State<ServerState>) -> Json<StatusResponse> {
    Json(compute_status(&state).await)
}

pub async fn printer_detail(
    State(_state): State<ServerState>,
    Path(name): Path<String>,
) -> Json<serde_json::Value> {
    let detail = pal_printer::printer_detail(&name).await;
    Json(json!({"name": name, "detail": detail}))
}

fn error_event(ts: i64, message: String) -> Event {
    Event::default()
        .event("error")
        .json_data(json!({"ts": ts, "error": message}))
        .unwrap_or_else(|_| Event::default().event("error").data("snapshot failed"))
}

async fn snapshot_event(state: &ServerState) -> Event {
    let ts = chrono::Utc::now().timestamp();
    let files = match list_uploads(state.upload_dir(), 25) {
        Ok(files) => files,
        Err(e) => return error_event(ts, e.to_string()),
    };
    let status = compute_status(state).await;
    match Event::default()
        .event("status")
        .json_data(json!({"ts": ts, "files": files, "status": status}))
    {
        Ok(event) => event,
        Err(e) => error_event(ts, e.to_string()),
    }
}

/// Server-push status stream.
///
/// Pushes a fresh snapshot every 2 seconds; a failing snapshot becomes an
/// `error` event and the connection stays open. The stream never ends on
/// its own.
pub async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = futures::stream::unfold((state, true), |(state, first)| async move {
        if !first {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        let event = snapshot_event(&state).await;
        Some((Ok(event), (state, false)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
