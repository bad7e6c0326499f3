//! Loaded model handle and the engine seam behind it

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::Result;

/// Output of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub tokens_generated: u32,
    pub latency_ms: u64,
}

/// A loaded model that can answer prompts.
///
/// Implementations are shared read-only across concurrent requests, so any
/// per-request scratch state (contexts, batches, samplers) must be created
/// inside `generate`.
pub trait InferenceEngine: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Run `prompt` to completion, blocking the calling thread.
    fn generate(&self, prompt: &str, params: &GenerationConfig) -> Result<Completion>;
}

/// Opaque, cheaply clonable reference to a loaded model
#[derive(Clone)]
pub struct ModelHandle {
    engine: Arc<dyn InferenceEngine>,
    path: PathBuf,
    loaded_at: DateTime<Local>,
}

impl ModelHandle {
    pub fn new(engine: Arc<dyn InferenceEngine>, path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            path: path.into(),
            loaded_at: Local::now(),
        }
    }

    pub fn generate(&self, prompt: &str, params: &GenerationConfig) -> Result<Completion> {
        self.engine.generate(prompt, params)
    }

    pub fn backend(&self) -> &str {
        self.engine.name()
    }

    /// Artifact the model was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Local> {
        self.loaded_at
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.engine.name())
            .field("path", &self.path)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}
