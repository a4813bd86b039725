pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{AppConfig, ConfigStore};
pub use error::{AppError, Result};
pub use server::Server;
pub use state::ServerState;
