//! Turning an artifact on disk into a `ModelHandle`

use std::path::Path;
#[cfg(feature = "llama")]
use std::sync::Arc;
use tracing::info;

use super::handle::ModelHandle;
#[cfg(feature = "llama")]
use super::llama::LlamaEngine;
use crate::error::{HowlError, Result};

/// Loads a model artifact. Called off the async runtime; may block for a long time.
pub trait ModelLoader: Send + Sync {
    /// Fails when this loader can never produce a handle, so callers can
    /// skip fetching an artifact nobody will be able to load.
    fn available(&self) -> Result<()> {
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<ModelHandle>;
}

impl<F> ModelLoader for F
where
    F: Fn(&Path) -> Result<ModelHandle> + Send + Sync,
{
    fn load(&self, path: &Path) -> Result<ModelHandle> {
        self(path)
    }
}

/// Loads GGUF artifacts with the compiled-in backend
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalModelLoader;

impl LocalModelLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModelLoader for LocalModelLoader {
    fn available(&self) -> Result<()> {
        if cfg!(feature = "llama") {
            Ok(())
        } else {
            Err(HowlError::BackendUnavailable)
        }
    }

    fn load(&self, path: &Path) -> Result<ModelHandle> {
        self.available()?;
        if !path.is_file() {
            return Err(HowlError::ModelLoad(format!(
                "{} does not exist",
                path.display()
            )));
        }

        info!("Loading model from {}", path.display());
        load_with_backend(path)
    }
}

#[cfg(feature = "llama")]
fn load_with_backend(path: &Path) -> Result<ModelHandle> {
    let engine = LlamaEngine::load(path)?;
    Ok(ModelHandle::new(Arc::new(engine), path))
}

#[cfg(not(feature = "llama"))]
fn load_with_backend(_path: &Path) -> Result<ModelHandle> {
    Err(HowlError::BackendUnavailable)
}
