// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Errors surfaced by the control core and its collaborators
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("target is gone: {0}")]
    TargetGone(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
