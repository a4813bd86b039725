//! # pal-printer
//!
//! Printing library for PrinterPal - orchestration of the OS print stack
//! only, no HTTP awareness.
//!
//! ## Scope
//!
//! This crate handles HOW printing happens:
//! - External command execution with timeouts (`lpstat`, `lp`, `cancel`,
//!   `pdfinfo`, `pdftoppm`, the root helper)
//! - CUPS queue and printer enumeration with text-output parsing
//! - Document rendering: preview PNGs and print-ready PDFs with the
//!   raw/grayscale/bw/dither/outline mode filters
//! - AirPrint re-advertisement with rate limiting and mutual exclusion
//!
//! Policy (WHAT to print, which upload, which printer) stays in
//! application code: request handling and configuration live in
//! `pal-server`.
//!
//! ## Example
//!
//! ```ignore
//! use pal_printer::{RenderMode, prepare_print_file, print_file};
//! use std::time::Duration;
//!
//! let prepared = prepare_print_file(path, RenderMode::Bw, 200, 30, 180).await?;
//! let res = print_file(&prepared.path, None, 1, "PrinterPal: doc.pdf", &[],
//!     Duration::from_secs(60)).await?;
//! ```

mod airprint;
mod command;
mod cups;
mod error;
mod pdf;
mod render;

// Re-exports
pub use airprint::{
    Clock, DEFAULT_ROOT_HELPER, ENSURE_WINDOW, EnsureLimiter, EnsureTicket, MonotonicClock,
    ensure_airprint, maybe_ensure, restart_host, root_helper_path,
};
pub use command::{CmdResult, run_cmd, which};
pub use cups::{
    Job, JobStats, PrinterInfo, SchedulerStatus, cancel_job, cups_available, default_printer,
    default_printer_display, job_stats, list_printers, print_file, printer_detail, queue_jobs,
    scheduler_status,
};
pub use error::{PalError, PalResult};
pub use pdf::images_to_pdf;
pub use render::{
    PreparedFile, RenderMode, SUPPORTED_IMAGE_EXTS, apply_mode, pdf_page_count, prepare_print_file,
    render_pdf_page, render_preview_png,
};
