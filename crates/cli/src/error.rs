//! CLI error types.

use crate::config::ConfigError;
use runtime::{ModelError, ToolError};
use thiserror::Error;

/// CLI errors.
///
/// Errors from individual query turns never reach this type; the chat loop
/// reports them and keeps going.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The model backend could not be set up.
    #[error("could not set up model backend: {0}")]
    Backend(#[from] ModelError),

    /// The tool host session could not be established.
    #[error("could not connect to tool host: {0}")]
    Connect(#[from] ToolError),

    /// An I/O error occurred on the terminal.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
