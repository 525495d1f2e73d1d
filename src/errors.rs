// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not available: {0}")]
    ToolNotAvailable(String),

    #[error("Process was already executed")]
    AlreadyExecuted,

    #[error("Process has not completed yet")]
    NotYetComplete,

    #[error("Completion handle mismatch: {0}")]
    MismatchedCompletionHandle(&'static str),

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("Invalid execution request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Computation(#[from] crate::sync::ComputationFailure),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ToolError>;
