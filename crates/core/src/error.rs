//! Error types for chess-coach-core

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Corpus refresh cancelled")]
    Cancelled,

    #[error("Corpus refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("Corpus refresh task failed: {0}")]
    Task(String),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
