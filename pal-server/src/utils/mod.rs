//! Utility modules

pub mod fmt;
pub mod logger;

pub use fmt::human_bytes;
pub use logger::{init_logger, init_logger_with_file};
