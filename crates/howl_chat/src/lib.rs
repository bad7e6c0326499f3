//! howl_chat: terminal chat over a locally downloaded language model
//!
//! This library provides:
//! - Model fetching: one HTTP download into local storage, replacing the previous artifact
//! - Model loading: artifact on disk to a shared `ModelHandle` (llama.cpp behind the `llama` feature)
//! - Inference routing: user text to prompt to reply, with every failure folded into the reply
//! - The chat application: lifecycle state, status line and transcript, updated from an event queue
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use howl_chat::{ChatApp, ChatConfig, LocalModelLoader, ModelFetcher};
//!
//! #[tokio::main]
//! async fn main() -> howl_chat::Result<()> {
//!     let config = ChatConfig::new();
//!     let fetcher = ModelFetcher::new(config.fetch.clone())?;
//!     let (mut app, mut events) = ChatApp::new(config);
//!
//!     app.start_model_setup(fetcher, Arc::new(LocalModelLoader::new()))?;
//!     while let Some(event) = events.recv().await {
//!         app.apply(event);
//!         if app.state().is_terminal() {
//!             break;
//!         }
//!     }
//!
//!     app.submit("hello");
//!     if let Some(event) = events.recv().await {
//!         app.apply(event);
//!     }
//!     println!("{}", app.transcript().render());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod error;
pub mod state;

// Configuration module
pub mod config;

// Core functionality
pub mod app;
pub mod chat;
pub mod model;
pub mod router;

pub use error::{HowlError, Result};
pub use state::ModelState;

// Config re-exports
pub use config::{
    render_prompt, ChatConfig, FetchConfig, GenerationConfig, DEFAULT_MODEL_FILE,
    DEFAULT_MODEL_URL, DEFAULT_PROMPT_TEMPLATE,
};

// Model re-exports
pub use model::{
    Completion, DownloadProgress, DownloadResult, InferenceEngine, LocalModelLoader,
    ModelFetcher, ModelHandle, ModelLoader,
};

// Chat re-exports
pub use chat::{ChatMessage, Origin, Transcript};
pub use router::{InferenceRouter, EMPTY_REPLY, NOT_LOADED_REPLY};
pub use app::{AppEvent, ChatApp, EventReceiver, EventSender};
