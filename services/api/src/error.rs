//! services/api/src/error.rs
//!
//! Startup failures of the listing assistant service. Once the server runs,
//! completion and chat-log failures are logged per turn instead.

use crate::config::ConfigError;
use listing_assistant_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A missing Gemini key or an unparseable setting.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Loading the listing catalog failed, e.g. `LISTINGS_PATH` points nowhere.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The Postgres chat-log store could not be reached.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener or serving connections failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An `ALLOWED_ORIGIN` that is not a valid header value.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
