//! Error types for the printing library

use thiserror::Error;

use crate::command::CmdResult;

/// Printing pipeline error types
#[derive(Debug, Error)]
pub enum PalError {
    /// Binary or file could not be located
    #[error("Not found: {0}")]
    NotFound(String),

    /// External process exceeded its time budget
    #[error("Command timed out after {timeout_s:.1}s: {command}")]
    Timeout { command: String, timeout_s: f64 },

    /// External process exited non-zero while `check` was requested
    #[error("Command failed ({code}): {command}", code = .0.code, command = .0.command_line())]
    CommandFailed(CmdResult),

    /// Print submission rejected by the spooler
    #[error("Printing failed: {0}")]
    Print(String),

    /// Bad caller input (copies out of range, malformed job id, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unparseable tool output, oversized PDF, invalid dimensions
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration schema violation
    #[error("Config error: {0}")]
    Config(String),

    /// IO error during file handling
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for printing operations
pub type PalResult<T> = Result<T, PalError>;
