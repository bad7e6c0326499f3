//! Model artifact handling
//!
//! This module provides:
//! - `fetcher`: HTTP download of the artifact into local storage
//! - `handle`: the engine trait and the shared `ModelHandle`
//! - `loader`: turning an artifact on disk into a `ModelHandle`
//! - `llama`: llama.cpp engine (behind the `llama` feature)

mod fetcher;
mod handle;
#[cfg(feature = "llama")]
mod llama;
mod loader;

pub use fetcher::{DownloadProgress, DownloadResult, ModelFetcher};
#[cfg(test)]
pub(crate) use fetcher::test_server;
pub use handle::{Completion, InferenceEngine, ModelHandle};
#[cfg(feature = "llama")]
pub use llama::LlamaEngine;
pub use loader::{LocalModelLoader, ModelLoader};
