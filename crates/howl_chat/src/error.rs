//! Error types for model setup and chat routing
//!
//! The `Display` text of every variant is the status line shown to the user.

use thiserror::Error;

use crate::state::ModelState;

#[derive(Debug, Error)]
pub enum HowlError {
    #[error("Invalid model URL.")]
    InvalidUrl(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Error moving model file: {0}")]
    MoveArtifact(std::io::Error),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to load model: inference backend not compiled in")]
    BackendUnavailable,

    #[error("Error generating response: {0}")]
    Inference(String),

    #[error("Invalid model state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ModelState, to: ModelState },
}

impl From<reqwest::Error> for HowlError {
    fn from(e: reqwest::Error) -> Self {
        HowlError::Download(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HowlError>;
