//! Command error types.

use std::path::PathBuf;

use fluffd_devices::DeviceError;
use thiserror::Error;

/// Errors raised while resolving, validating or running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A parameter is missing, mistyped or out of range. Nothing was written.
    #[error("Invalid parameter: {0}")]
    Validation(String),

    /// No command, category or shortcut with this name.
    #[error("Command not found: {0}")]
    UnknownCommand(String),

    /// The name refers to a category, which only groups shortcuts.
    #[error("'{0}' is a category; use '{0}/<shortcut>'")]
    NotExecutable(String),

    /// A shortcut points at something other than a direct command.
    #[error("Shortcut '{0}' does not resolve to a direct command")]
    BadShortcut(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("File error: {0}")]
    File(String),

    /// The device layer reported a failure.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
